pub mod base;
pub mod room;

pub use base::BaseDao;
pub use room::RoomDao;
