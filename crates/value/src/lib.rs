//! The value representation, deep-object machinery and name-lookup database
//! shared by every other crate in the lanes workspace.

pub mod deep;
pub mod error;
pub mod lookup;
pub mod value;

pub use deep::{DeepFactory, DeepHandle};
pub use error::ValueError;
pub use lookup::LookupDatabase;
pub use value::{Function, LightUserdata, Table, UserData, Value};
