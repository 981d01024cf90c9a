pub mod glyphs;
pub mod id;
pub mod raw;
pub mod text;
pub mod validation;
