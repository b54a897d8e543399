pub mod app_config;
pub mod database;
pub mod mercadopago;
pub mod order_repo;
pub mod product_repo;

pub use database::DbClient;
pub use mercadopago::MercadoPagoClient;
pub use order_repo::StoreOrderRepository;
pub use product_repo::StoreProductRepository;

pub(crate) fn storage_error(err: sqlx::Error) -> storefront_core::CoreError {
    storefront_core::CoreError::StorageError(err.to_string())
}
