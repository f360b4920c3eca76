pub mod changelog;
pub mod names;
pub mod rehearse;
