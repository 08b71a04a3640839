use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::Subcommand;
use colored::Colorize;
use folio_lib::{
    Repository,
    flows::{self, FlowError, PictureUpload, ProfileEdit},
};

use crate::account::{current_session, remember};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show your profile
    Show,
    /// Edit your profile. Fields that are not given stay as they are.
    Edit {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Pass an empty string to clear
        #[arg(long)]
        bio: Option<String>,
        /// Comma separated, pass an empty string to clear
        #[arg(long)]
        achievements: Option<String>,
        /// Image file to use as profile picture
        #[arg(long)]
        picture: Option<PathBuf>,
    },
}

pub fn handle(repo: &Repository, cmd: &Command) -> Result<(), FlowError> {
    let mut session = current_session()?;

    match cmd {
        Command::Show => {
            let view = flows::view_profile(repo, &session)?;

            println!("{}", view.title.bold());
            println!("Name:     {}", view.display_name);
            println!("Email:    {}", view.email);
            println!("Joined:   {}", view.joined_at.format("%Y-%m-%d"));
            if let Some(bio) = &view.bio {
                println!("Bio:      {bio}");
            }
            if let Some(picture) = &view.picture {
                println!("Picture:  {}", picture.display());
            }
            if !view.achievements.is_empty() {
                println!("Achievements:");
                for achievement in &view.achievements {
                    println!("* {achievement}");
                }
            }
        }
        Command::Edit {
            name,
            email,
            bio,
            achievements,
            picture,
        } => {
            let picture = picture.as_deref().map(read_picture).transpose()?;
            let edit = ProfileEdit {
                display_name: name.clone(),
                email: email.clone(),
                bio: bio.clone(),
                achievements: achievements.clone(),
                picture,
            };

            // The session follows an identity change even when a later step fails
            let result = flows::edit_profile(repo, &mut session, &edit);
            remember(&session)?;
            let report = result?;

            if let Some(err) = &report.identity_error {
                eprintln!("{}", err.message(false).yellow());
            }
            if report.identity_changed {
                println!("Email changed to {}", session.identity_key());
            }
            println!("{}", "Profile saved".green());
        }
    }

    Ok(())
}

fn read_picture(path: &Path) -> Result<PictureUpload, FlowError> {
    let bytes = fs::read(path).map_err(|e| {
        FlowError::Validation(format!("Could not read {}: {e}", path.display()))
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(PictureUpload { name, bytes })
}
