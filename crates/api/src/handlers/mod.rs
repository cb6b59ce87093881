pub mod editor;
pub mod pages;
