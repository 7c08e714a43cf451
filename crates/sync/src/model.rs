//! Cart data model.
//!
//! A [`CartSnapshot`] is the ordered list of [`CartLineItem`]s shown to the
//! shopper. Lines are unique by [`LineKey`] and never carry a zero quantity;
//! every constructor and mutator upholds both rules.

use core::fmt;
use core::str::FromStr;

use serde::Serialize;
use storecart_core::{CartLineId, Price, ProductId, ProductStatus};

// =============================================================================
// LineKey
// =============================================================================

/// Address of a cart line.
///
/// Lines known to the cart service are addressed by their remote ID. Lines
/// that were only ever stored locally fall back to their product ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LineKey {
    /// Line ID assigned by the cart service.
    Remote(CartLineId),
    /// Local-only line, addressed by product.
    Local(ProductId),
}

impl LineKey {
    /// The remote line ID, if this key has one.
    #[must_use]
    pub const fn remote_id(&self) -> Option<CartLineId> {
        match self {
            Self::Remote(id) => Some(*id),
            Self::Local(_) => None,
        }
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(id) => write!(f, "{id}"),
            Self::Local(product) => write!(f, "p:{product}"),
        }
    }
}

/// Error parsing a [`LineKey`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid line key '{0}' (expected <line-id> or p:<product-id>)")]
pub struct LineKeyParseError(String);

impl FromStr for LineKey {
    type Err = LineKeyParseError;

    /// Parses `42` as a remote line and `p:10` as a local line for product 10.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || LineKeyParseError(s.to_string());
        match s.trim().strip_prefix("p:") {
            Some(product) => product.parse().map(Self::Local).map_err(|_| err()),
            None => s.parse().map(Self::Remote).map_err(|_| err()),
        }
    }
}

// =============================================================================
// CartLineItem
// =============================================================================

/// One product entry in the cart.
///
/// Serializes in the server naming convention (`name` / `price`), which is
/// also the shape written to durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    /// Line ID assigned by the cart service; `None` for local-only lines.
    pub id: Option<CartLineId>,
    /// Referenced product.
    pub product_id: ProductId,
    /// Units in the cart. Zero only ever appears on server replies that
    /// report a removed line.
    pub quantity: u32,
    /// Whether the line participates in checkout totals.
    pub selected: bool,
    /// Product display name.
    pub name: Option<String>,
    /// Unit price; `None` when no record has reported one yet.
    pub price: Option<Price>,
    /// Product image URL.
    pub product_image: Option<String>,
    /// Units in stock when the line was last refreshed.
    pub product_stock: Option<u32>,
    /// Product availability when the line was last refreshed.
    pub product_status: Option<ProductStatus>,
}

impl CartLineItem {
    /// Address of this line.
    #[must_use]
    pub fn key(&self) -> LineKey {
        self.id
            .map_or(LineKey::Local(self.product_id), LineKey::Remote)
    }

    /// Price of this line (`price × quantity`). An unknown price counts as zero.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.unwrap_or(Price::ZERO).times(self.quantity)
    }

    /// Overlay server-authoritative fields onto a locally cached line.
    ///
    /// Server values win; display fields the server left out are carried
    /// over from `local`.
    #[must_use]
    pub fn merged_over(self, local: Option<&Self>) -> Self {
        let Some(local) = local else {
            return self;
        };
        Self {
            id: self.id.or(local.id),
            name: self.name.or_else(|| local.name.clone()),
            price: self.price.or(local.price),
            product_image: self.product_image.or_else(|| local.product_image.clone()),
            product_stock: self.product_stock.or(local.product_stock),
            product_status: self.product_status.or(local.product_status),
            ..self
        }
    }
}

/// Product details needed to put a product into the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSummary {
    /// Product ID.
    pub id: ProductId,
    /// Display name.
    pub name: Option<String>,
    /// Unit price.
    pub price: Price,
    /// Image URL.
    pub image: Option<String>,
    /// Units in stock.
    pub stock: Option<u32>,
    /// Availability.
    pub status: Option<ProductStatus>,
}

impl ProductSummary {
    /// A product with only an ID and a price.
    #[must_use]
    pub const fn new(id: ProductId, price: Price) -> Self {
        Self {
            id,
            name: None,
            price,
            image: None,
            stock: None,
            status: None,
        }
    }

    /// A fresh, selected, local-only line with quantity 1.
    #[must_use]
    pub fn to_line(&self) -> CartLineItem {
        CartLineItem {
            id: None,
            product_id: self.id,
            quantity: 1,
            selected: true,
            name: self.name.clone(),
            price: Some(self.price),
            product_image: self.image.clone(),
            product_stock: self.stock,
            product_status: self.status,
        }
    }
}

// =============================================================================
// CartSnapshot
// =============================================================================

/// Ordered collection of cart lines, unique by [`LineKey`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct CartSnapshot {
    lines: Vec<CartLineItem>,
}

impl CartSnapshot {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a snapshot, dropping zero-quantity lines and later duplicates.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLineItem>) -> Self {
        let mut snapshot = Self::new();
        for line in lines {
            if line.quantity > 0 && snapshot.position(&line.key()).is_none() {
                snapshot.lines.push(line);
            }
        }
        snapshot
    }

    /// Lines in display order.
    #[must_use]
    pub fn lines(&self) -> &[CartLineItem] {
        &self.lines
    }

    /// Iterate lines in display order.
    pub fn iter(&self) -> impl Iterator<Item = &CartLineItem> {
        self.lines.iter()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Index of the line with `key`.
    #[must_use]
    pub fn position(&self, key: &LineKey) -> Option<usize> {
        self.lines.iter().position(|line| line.key() == *key)
    }

    /// Index of the first line referencing `product`.
    #[must_use]
    pub fn position_of_product(&self, product: ProductId) -> Option<usize> {
        self.lines.iter().position(|line| line.product_id == product)
    }

    /// The line with `key`.
    #[must_use]
    pub fn get(&self, key: &LineKey) -> Option<&CartLineItem> {
        self.lines.iter().find(|line| line.key() == *key)
    }

    /// Sum of quantities over all lines.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Sum of line totals over all lines.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.lines.iter().map(CartLineItem::line_total).sum()
    }

    /// Sum of line totals over selected lines.
    #[must_use]
    pub fn selected_total(&self) -> Price {
        self.lines
            .iter()
            .filter(|line| line.selected)
            .map(CartLineItem::line_total)
            .sum()
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut CartLineItem> {
        self.lines.get_mut(index)
    }

    /// Append a line, or drop it if its quantity is zero.
    pub(crate) fn push(&mut self, line: CartLineItem) {
        self.insert(self.lines.len(), line);
    }

    /// Insert at `index` (clamped to the end). Replaces an existing line with
    /// the same key instead of duplicating it.
    pub(crate) fn insert(&mut self, index: usize, line: CartLineItem) {
        if line.quantity == 0 {
            self.remove(&line.key());
            return;
        }
        if let Some(existing) = self.position(&line.key()) {
            self.replace_at(existing, line);
            return;
        }
        let index = index.min(self.lines.len());
        self.lines.insert(index, line);
    }

    /// Replace the line at `index`. Zero quantity removes it; any other line
    /// already holding the new key is dropped.
    pub(crate) fn replace_at(&mut self, index: usize, line: CartLineItem) {
        if index >= self.lines.len() {
            self.push(line);
            return;
        }
        if line.quantity == 0 {
            self.lines.remove(index);
            return;
        }
        let key = line.key();
        if let Some(slot) = self.lines.get_mut(index) {
            *slot = line;
        }
        let mut position = 0;
        self.lines.retain(|other| {
            let keep = position == index || other.key() != key;
            position += 1;
            keep
        });
    }

    /// Remove the line with `key`, returning its former index and value.
    pub(crate) fn remove(&mut self, key: &LineKey) -> Option<(usize, CartLineItem)> {
        let index = self.position(key)?;
        Some((index, self.lines.remove(index)))
    }

    /// Remove every line whose key is in `keys`. Returns how many were removed.
    pub(crate) fn remove_all(&mut self, keys: &[LineKey]) -> usize {
        let before = self.lines.len();
        self.lines.retain(|line| !keys.contains(&line.key()));
        before - self.lines.len()
    }
}

impl<'a> IntoIterator for &'a CartSnapshot {
    type Item = &'a CartLineItem;
    type IntoIter = core::slice::Iter<'a, CartLineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}
