mod collection;
mod ids;
mod item;
mod user;

pub use collection::{Collection, CollectionError};
pub use ids::{ItemId, ParseIdError, UserId};
pub use item::{ItemType, ItemTypeError, LearnedItem};
pub use user::User;
