//! Catalog records: suppliers and the products they own.

use common::{ProductId, SupplierId};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// A supplier of catalog products.
///
/// Products point back to their supplier through [`Product::supplier_id`];
/// the supplier itself holds no collection of products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub contact_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    /// Company registration / tax number.
    pub tax_id: String,
}

/// Data for registering a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    pub contact_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub tax_id: String,
}

impl NewSupplier {
    /// Turns the registration data into a supplier record with the given id.
    pub fn into_supplier(self, id: SupplierId) -> Supplier {
        Supplier {
            id,
            name: self.name,
            contact_name: self.contact_name,
            phone: self.phone,
            email: self.email,
            address: self.address,
            tax_id: self.tax_id,
        }
    }
}

/// A product in the catalog together with its current stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub supplier_id: SupplierId,
    pub name: String,
    pub description: Option<String>,
    /// Current catalog price per unit.
    pub price: Money,
    /// Units on hand. Only the stock reservation path changes this.
    pub stock: u32,
    /// Threshold at or below which the product counts as low on stock.
    pub min_stock: u32,
    pub active: bool,
}

impl Product {
    /// Returns true if stock is at or below the minimum threshold.
    pub fn is_low_on_stock(&self) -> bool {
        self.stock <= self.min_stock
    }
}

/// Data for registering a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub supplier_id: SupplierId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub initial_stock: u32,
    pub min_stock: u32,
    pub active: bool,
}

impl NewProduct {
    /// Turns the registration data into a product record with the given id.
    pub fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            supplier_id: self.supplier_id,
            name: self.name,
            description: self.description,
            price: self.price,
            stock: self.initial_stock,
            min_stock: self.min_stock,
            active: self.active,
        }
    }
}
