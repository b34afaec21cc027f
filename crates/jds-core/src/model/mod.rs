pub mod entity;
pub mod overview;
pub mod shared;
pub mod value;

pub use entity::Entity;
pub use overview::Overview;
pub use shared::SharedEntity;
pub use value::{Scalar, Value};
