pub mod thread;
pub mod turn;

pub use thread::{title_from_content, Thread, TitleFill, DEFAULT_THREAD_TITLE};
pub use turn::{Turn, TurnState, TurnVersion};
