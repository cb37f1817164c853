mod steps;
mod world;

pub use world::InvoiceWorld;
