//! Readers of the TOC broadcast: the hierarchical side menu, the linear
//! text changer and the occurrence title lookup.

pub mod occurrence;
pub mod side_menu;
pub mod text_changer;
