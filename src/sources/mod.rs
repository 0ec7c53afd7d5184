pub mod lists;
pub mod lookup;
