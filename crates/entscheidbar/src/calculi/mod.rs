pub mod tableaux;
