pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod pricing;

#[cfg(test)]
pub(crate) mod test_support;
