pub mod error;
pub mod hash;
pub mod index;
pub mod map;
pub mod model;
pub mod tree;

use colored::Colorize;

pub use error::{IndexError, Result};
pub use hash::name_hash;
pub use index::StructureIndex;
pub use map::SiteMap;
pub use model::{ROOT_PARENT, StructureNode};

pub fn print_banner() {
    let banner = r#"
   __ _ _ __| |__   ___  _ __
  / _` | '__| '_ \ / _ \| '__|
 | (_| | |  | |_) | (_) | |
  \__,_|_|  |_.__/ \___/|_|
"#;
    println!("{}", banner.bright_green().bold());
    println!(
        "  {} {}\n",
        "site structure index".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
}
