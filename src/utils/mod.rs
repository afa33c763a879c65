pub mod checkout_ownership;
pub mod html;
