pub mod thread;
pub mod turn;

pub use thread::MongoThreadRepository;
pub use turn::MongoTurnRepository;
