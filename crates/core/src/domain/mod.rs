pub mod customization;
pub mod email;
pub mod product;
pub mod rule;
pub mod site;
pub mod variant;
