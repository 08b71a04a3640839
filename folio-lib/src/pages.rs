//! The static content pages.

use clap::ValueEnum;
use strum::{Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString, ValueEnum)]
#[strum(serialize_all = "kebab-case")]
pub enum Page {
    Home,
    /// Landing page after signing in
    SignedHome,
    Blog,
    NewBlog,
    Design,
}

impl Page {
    pub fn title(&self) -> &'static str {
        match self {
            Page::Home => "Welcome to Folio",
            Page::SignedHome => "Welcome back",
            Page::Blog => "Blog",
            Page::NewBlog => "Write a new post",
            Page::Design => "Design",
        }
    }

    pub fn body(&self) -> &'static str {
        match self {
            Page::Home => "Sign up or log in to build your profile.",
            Page::SignedHome => "Your profile, your posts and the latest design notes are one step away.",
            Page::Blog => "Posts from the community will show up here.",
            Page::NewBlog => "Share what you have been working on.",
            Page::Design => "Notes on how Folio looks and why.",
        }
    }

    /// Whether the page is only shown to signed in users.
    pub fn requires_session(&self) -> bool {
        matches!(self, Page::SignedHome | Page::NewBlog)
    }
}
