//! Quill IR - declarations and types consumed by the conformance checker.
//!
//! This crate contains the data the checker reads but never mutates:
//! - `Name` and `StringInterner` for interned identifiers
//! - `Span` for source locations
//! - `TyId`/`TypeData` and the interned `TypePool`
//! - The declaration model (`Decl`, `DeclKind`, generic signatures)
//! - The `DeclGraph` trait and its in-memory `DeclStore`
//!
//! # Design Philosophy
//!
//! - **Intern Everything**: Strings → Name(u32), Types → TyId(u32)
//! - **Flatten Everything**: declarations refer to each other through `DeclId(u32)`
//! - **Read-only during checking**: the graph is built up front, then only queried

mod decl;
mod graph;
mod interner;
mod name;
mod span;
mod types;

pub use decl::{
    AccessLevel, AssocTypeDecl, Availability, Decl, DeclFlags, DeclId, DeclKind, DeclName,
    DerivationKind, ExtensionDecl, FuncDecl, GenericParamDef, GenericParamKey,
    GenericRequirement, GenericSigId, GenericSignature, ImplementsAttr, InitDecl, Isolation,
    NominalDecl, NominalKind, ProtocolDecl, SubscriptDecl, TypeAliasDecl, VarDecl, Version,
    VersionParseError,
};
pub use graph::{DeclGraph, DeclStore};
pub use interner::{InternError, StringInterner};
pub use name::Name;
pub use span::Span;
pub use types::{FnFlags, FunctionType, PlaceholderId, TyId, TypeData, TypeFolder, TypePool};
