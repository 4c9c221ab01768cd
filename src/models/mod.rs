pub mod user;
pub mod catalog;
pub mod cart;
pub mod order;

pub use user::{User, CreateUser, LoginRequest, Role, UserResponse};
pub use catalog::{
    Category, CategoryForm, CategoryInput,
    Product, ProductListing, ProductDisplay, ProductForm, ProductInput,
};
pub use cart::{
    CartItem, CartLine, CartLineDisplay, CartEntry, StockShortfall,
    AddToCartForm, UpdateCartForm, SaveCartRequest,
};
pub use order::{
    Order, OrderItem, OrderWithItems, OrderStatus, PaymentStatus,
    CheckoutForm, CheckoutDetails, ShippingMethod,
    OrderDisplay, OrderItemDisplay,
};
