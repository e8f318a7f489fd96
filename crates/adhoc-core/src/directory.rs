//! Product directory: maps raw product codes to canonical ones and
//! holds display names.
//!
//! Regional releases of one title ship under different product codes
//! but must meet in the same game. A *crosslink* rewrites such a code
//! to the canonical one before the game is resolved.

use std::collections::BTreeMap;

use adhoc_protocol::ProductCode;
use tracing::info;

/// Storage-agnostic product directory.
pub trait ProductDirectory {
    /// Canonical code for `code`. Called once per valid login; unknown
    /// codes are recorded as a side effect.
    fn resolve_canonical_product(&mut self, code: ProductCode) -> ProductCode;

    /// Human-readable title, if known.
    fn display_name(&self, code: &ProductCode) -> Option<String>;
}

/// In-memory directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    products: BTreeMap<ProductCode, String>,
    crosslinks: BTreeMap<ProductCode, ProductCode>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        MemoryDirectory::default()
    }

    pub fn add_product(&mut self, code: ProductCode, name: impl Into<String>) {
        self.products.insert(code, name.into());
    }

    pub fn add_crosslink(&mut self, from: ProductCode, to: ProductCode) {
        self.crosslinks.insert(from, to);
    }

    pub fn contains(&self, code: &ProductCode) -> bool {
        self.products.contains_key(code)
    }

    pub fn products(&self) -> &BTreeMap<ProductCode, String> {
        &self.products
    }

    pub fn crosslinks(&self) -> &BTreeMap<ProductCode, ProductCode> {
        &self.crosslinks
    }

    /// Crosslink target or a new-product insertion, whichever applies.
    ///
    /// Returns the canonical code and whether the product table changed,
    /// so persistent directories know when to write back.
    pub fn resolve(&mut self, code: ProductCode) -> (ProductCode, bool) {
        if let Some(target) = self.crosslinks.get(&code) {
            info!("Crosslinked {} to {}", code, target);
            return (*target, false);
        }
        if self.products.contains_key(&code) {
            return (code, false);
        }
        self.products.insert(code, code.to_string());
        info!("Added unknown product id {}", code);
        (code, true)
    }
}

impl ProductDirectory for MemoryDirectory {
    fn resolve_canonical_product(&mut self, code: ProductCode) -> ProductCode {
        self.resolve(code).0
    }

    fn display_name(&self, code: &ProductCode) -> Option<String> {
        self.products.get(code).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> ProductCode {
        ProductCode::parse(s).unwrap()
    }

    #[test]
    fn unknown_products_are_recorded_once() {
        let mut dir = MemoryDirectory::new();
        assert_eq!(dir.resolve(code("ULUS10041")), (code("ULUS10041"), true));
        assert_eq!(dir.resolve(code("ULUS10041")), (code("ULUS10041"), false));
        assert_eq!(
            dir.display_name(&code("ULUS10041")).as_deref(),
            Some("ULUS10041")
        );
    }

    #[test]
    fn crosslinks_rewrite_the_code() {
        let mut dir = MemoryDirectory::new();
        dir.add_product(code("ULUS10391"), "Monster Hunter Freedom Unite");
        dir.add_crosslink(code("ULES01213"), code("ULUS10391"));

        assert_eq!(dir.resolve_canonical_product(code("ULES01213")), code("ULUS10391"));
        assert!(!dir.contains(&code("ULES01213")));
        assert_eq!(
            dir.display_name(&code("ULUS10391")).as_deref(),
            Some("Monster Hunter Freedom Unite")
        );
    }
}
