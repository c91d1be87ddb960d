use std::fmt::Debug;

use log::*;

use crate::{
    api::errors::CartError,
    db_types::{Cart, CartItem, CartOwner},
    traits::StorefrontDatabase,
};

/// `CartApi` manages the mutable pre-checkout carts: one per identity, created lazily on the
/// first add, merged into the user's cart on login.
pub struct CartApi<B> {
    db: B,
}

impl<B> Debug for CartApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CartApi")
    }
}

impl<B> CartApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> CartApi<B>
where B: StorefrontDatabase
{
    /// The identity's cart, created lazily on first use.
    pub async fn cart_for_owner(&self, owner: &CartOwner) -> Result<Cart, CartError> {
        Ok(self.db.fetch_or_create_cart(owner).await?)
    }

    pub async fn items(&self, cart_id: i64) -> Result<Vec<CartItem>, CartError> {
        Ok(self.db.fetch_cart_items(cart_id).await?)
    }

    /// Adds a variant to the identity's cart, or adjusts the existing line.
    ///
    /// The quantity, variant-active and stock checks run up front and reject without writing
    /// anything; the stock check is then repeated against the incremented target inside the
    /// storage transaction, so concurrent adds on the same line cannot overcommit the variant.
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        variant_id: i64,
        quantity: i64,
        override_quantity: bool,
        selections: Option<String>,
    ) -> Result<CartItem, CartError> {
        if quantity < 1 {
            return Err(CartError::BadQuantity);
        }
        let variant = self
            .db
            .fetch_variant(variant_id)
            .await
            .map_err(CartError::Database)?
            .ok_or(CartError::VariantNotFound(variant_id))?;
        if !variant.is_active {
            return Err(CartError::InactiveVariant);
        }
        if variant.stock_quantity < quantity {
            return Err(CartError::InsufficientStock);
        }
        let cart = self.db.fetch_or_create_cart(owner).await?;
        let item = self.db.upsert_cart_item(cart.id, variant_id, quantity, override_quantity, selections).await?;
        debug!("🛒️ {owner} now has {}× variant #{variant_id} in cart #{}", item.quantity, cart.id);
        Ok(item)
    }

    /// Explicitly abandons the identity's cart, removing it and its lines. A missing cart is a
    /// no-op.
    pub async fn abandon(&self, owner: &CartOwner) -> Result<(), CartError> {
        if let Some(cart) = self.db.fetch_cart(owner).await? {
            self.db.delete_cart(cart.id).await?;
            debug!("🛒️ {owner} abandoned cart #{}", cart.id);
        }
        Ok(())
    }

    /// Folds the anonymous session cart into the user's cart on login, summing quantities for
    /// matching variants. A missing session cart is a no-op.
    pub async fn merge_on_login(&self, session_key: &str, user_id: i64) -> Result<(), CartError> {
        let source = match self.db.fetch_cart(&CartOwner::Session(session_key.to_string())).await? {
            Some(cart) => cart,
            None => return Ok(()),
        };
        let dest = self.db.fetch_or_create_cart(&CartOwner::User(user_id)).await?;
        if source.id == dest.id {
            return Ok(());
        }
        self.db.merge_carts(source.id, dest.id).await?;
        debug!("🛒️ Session cart #{} merged into user #{user_id}'s cart #{}", source.id, dest.id);
        Ok(())
    }
}
