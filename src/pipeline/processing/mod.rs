pub mod carriers;
pub mod consignment;
pub mod eligibility;
pub mod enrich;
pub mod normalize;
