//! Helper functions for templates and rendering

mod date;
mod html;
mod url;

pub use self::date::*;
pub use self::html::*;
pub use self::url::*;
