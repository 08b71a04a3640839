mod accounts;
mod profiles;

pub(crate) use accounts::AccountModel;
pub(crate) use profiles::ProfileModel;
