//! Site scrapers.
//!
//! Each submodule knows the page layout of one catalog site and exposes pure
//! parse functions over already fetched HTML. Network access and caching stay
//! in [`crate::crawler`], so parsers can be tested against literal markup.
//!
//! | Site | Module | Pages understood |
//! |------|--------|------------------|
//! | NetCarShow | [`netcarshow`] | root, vendor, model, wallpaper |

pub mod netcarshow;
