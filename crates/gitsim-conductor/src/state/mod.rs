pub mod derive;
pub mod machine;
