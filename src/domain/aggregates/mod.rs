//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{Category, CategoryInput, Product, ProductError, ProductInput, ProductPatch, LOW_STOCK_THRESHOLD};
pub use order::{CheckoutRequest, DraftItem, Order, OrderDraft, OrderError, OrderFilter, OrderItem, OrderStatus, OrderWithItems, PaymentMethod};
pub use cart::{merged_quantity, Cart, CartError, CartLine, CartSummary, ShippingPolicy};
