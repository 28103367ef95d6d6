pub mod inner_product;

pub use inner_product::InnerProduct;
