use serde::{Deserialize, Serialize};

use herbstore_core::{BrandId, CategoryId, DomainError, DomainResult, Entity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: BrandId,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
}

impl Entity for Brand {
    type Id = BrandId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Create request shared by categories and brands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTaxon {
    pub name: String,
    /// Derived from `name` when absent.
    pub slug: Option<String>,
}

impl NewTaxon {
    fn name_and_slug(&self) -> DomainResult<(String, String)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name is required"));
        }
        let slug = slugify(self.slug.as_deref().unwrap_or(name));
        if slug.is_empty() {
            return Err(DomainError::validation("slug must contain letters or digits"));
        }
        Ok((name.to_string(), slug))
    }

    pub fn into_category(self) -> DomainResult<Category> {
        let (name, slug) = self.name_and_slug()?;
        Ok(Category { id: CategoryId::new(), name, slug, is_active: true })
    }

    pub fn into_brand(self) -> DomainResult<Brand> {
        let (name, slug) = self.name_and_slug()?;
        Ok(Brand { id: BrandId::new(), name, slug, is_active: true })
    }
}

/// Lowercase ASCII alphanumerics joined by single dashes.
pub fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_dash = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Ayurvedic  Oils & Balms"), "ayurvedic-oils-balms");
        assert_eq!(slugify("  --Vitamin C--"), "vitamin-c");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn taxon_derives_slug_from_name() {
        let c = NewTaxon { name: " Hair Care ".to_string(), slug: None }
            .into_category()
            .unwrap();
        assert_eq!(c.name, "Hair Care");
        assert_eq!(c.slug, "hair-care");
        assert!(c.is_active);

        let b = NewTaxon { name: "Himalaya".to_string(), slug: Some("Himalaya Wellness".to_string()) }
            .into_brand()
            .unwrap();
        assert_eq!(b.slug, "himalaya-wellness");
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(NewTaxon { name: "  ".to_string(), slug: None }.into_category().is_err());
        assert!(NewTaxon { name: "Ok".to_string(), slug: Some("%%".to_string()) }.into_brand().is_err());
    }

    proptest! {
        #[test]
        fn slugs_are_url_safe(raw in ".{0,40}") {
            let s = slugify(&raw);
            prop_assert!(s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert!(!s.starts_with('-') && !s.ends_with('-'));
            prop_assert!(!s.contains("--"));
        }
    }
}
