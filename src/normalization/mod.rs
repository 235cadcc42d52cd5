pub mod name;

pub use name::normalize_name;
