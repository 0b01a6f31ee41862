mod parser;

pub use self::parser::{GlobalOptions, Parser};

pub enum Action {
    Backup,
    List,
    Prune,
}
