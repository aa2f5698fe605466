//! Rendering types and names for diagnostics.

use quill_ir::{
    DeclGraph, DeclId, DeclName, FnFlags, GenericRequirement, Isolation, Name, TyId, TypeData,
};

use crate::matcher::MismatchReason;

/// Renders types the way they are written in source.
#[derive(Copy, Clone)]
pub struct TypePrinter<'a> {
    graph: &'a dyn DeclGraph,
}

impl<'a> TypePrinter<'a> {
    pub fn new(graph: &'a dyn DeclGraph) -> Self {
        TypePrinter { graph }
    }

    pub fn ty(&self, ty: TyId) -> String {
        let mut out = String::new();
        self.write_ty(&mut out, ty);
        out
    }

    pub fn name(&self, name: &DeclName) -> String {
        name.display(self.graph.interner())
    }

    /// Full name of a declaration.
    pub fn decl(&self, decl: DeclId) -> String {
        self.name(&self.graph.decl(decl).name)
    }

    pub fn isolation(&self, isolation: Isolation) -> String {
        match isolation {
            Isolation::Nonisolated => "nonisolated".to_owned(),
            Isolation::ActorInstance(actor) => format!("isolated to actor `{}`", self.decl(actor)),
            Isolation::GlobalActor(name) => {
                format!("isolated to global actor `{}`", self.graph.interner().lookup(name))
            }
        }
    }

    fn write_ty(&self, out: &mut String, ty: TyId) {
        let interner = self.graph.interner();
        match self.graph.types().get(ty) {
            TypeData::Error => out.push_str("<<error>>"),
            TypeData::SelfType | TypeData::DynamicSelf(_) => out.push_str("Self"),
            TypeData::Nominal { decl, args } => {
                out.push_str(interner.lookup(self.graph.decl(decl).name.base));
                if !args.is_empty() {
                    out.push('<');
                    self.write_list(out, &args);
                    out.push('>');
                }
            }
            TypeData::Optional(inner) => {
                let needs_parens = matches!(self.graph.types().get(inner), TypeData::Function(_));
                if needs_parens {
                    out.push('(');
                }
                self.write_ty(out, inner);
                if needs_parens {
                    out.push(')');
                }
                out.push('?');
            }
            TypeData::Tuple(elems) => {
                out.push('(');
                self.write_list(out, &elems);
                out.push(')');
            }
            TypeData::Function(func) => {
                if func.flags.contains(FnFlags::ESCAPING) {
                    out.push_str("@escaping ");
                }
                if func.flags.contains(FnFlags::SENDABLE) {
                    out.push_str("@Sendable ");
                }
                out.push('(');
                self.write_list(out, &func.params);
                out.push(')');
                if func.flags.contains(FnFlags::ASYNC) {
                    out.push_str(" async");
                }
                if func.flags.contains(FnFlags::THROWS) {
                    out.push_str(" throws");
                }
                out.push_str(" -> ");
                self.write_ty(out, func.result);
            }
            TypeData::GenericParam(key) => {
                out.push_str(&format!("τ_{}_{}", key.depth, key.index));
            }
            TypeData::DependentMember { base, assoc } => {
                self.write_ty(out, base);
                out.push('.');
                out.push_str(interner.lookup(self.graph.decl(assoc).name.base));
            }
            TypeData::Placeholder(_) => out.push('_'),
            TypeData::OpenAssoc(assoc) => {
                out.push_str("Self.");
                out.push_str(interner.lookup(self.graph.decl(assoc).name.base));
            }
        }
    }

    fn write_list(&self, out: &mut String, tys: &[TyId]) {
        for (i, &ty) in tys.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_ty(out, ty);
        }
    }

    /// Argument labels as written in a full name, e.g. `(x:_:)`.
    fn labels(&self, labels: Option<&[Name]>) -> String {
        let Some(labels) = labels else {
            return String::new();
        };
        let interner = self.graph.interner();
        let mut out = String::from("(");
        for &label in labels {
            out.push_str(if label.is_empty() { "_" } else { interner.lookup(label) });
            out.push(':');
        }
        out.push(')');
        out
    }

    /// Human-readable explanation of a mismatch.
    pub fn mismatch(&self, reason: &MismatchReason) -> String {
        match reason {
            MismatchReason::Kind => "it is a different kind of declaration".to_owned(),
            MismatchReason::StaticMismatch => "static-ness does not match".to_owned(),
            MismatchReason::Arity { expected, found } => {
                format!("it takes {found} argument(s), but {expected} are required")
            }
            MismatchReason::Labels { expected, found } => format!(
                "argument labels `{}` do not match `{}`",
                self.labels(found.as_deref()),
                self.labels(expected.as_deref())
            ),
            MismatchReason::Async => "it is `async`, but the requirement is not".to_owned(),
            MismatchReason::Throws => "it `throws`, but the requirement does not".to_owned(),
            MismatchReason::ParamType {
                index,
                expected,
                found,
            } => format!(
                "parameter {} has type `{}`, expected `{}`",
                index + 1,
                self.ty(*found),
                self.ty(*expected)
            ),
            MismatchReason::ResultType { expected, found } => format!(
                "it returns `{}`, expected `{}`",
                self.ty(*found),
                self.ty(*expected)
            ),
            MismatchReason::PropertyType { expected, found } => format!(
                "it has type `{}`, expected `{}`",
                self.ty(*found),
                self.ty(*expected)
            ),
            MismatchReason::ParamOptionality { index } => format!(
                "parameter {} must accept an optional value",
                index + 1
            ),
            MismatchReason::NotSettable => "it is not settable".to_owned(),
            MismatchReason::Failability => {
                "it is failable, but the requirement is not".to_owned()
            }
            MismatchReason::GenericConstraint { requirement } => match *requirement {
                GenericRequirement::Conforms { subject, protocol } => format!(
                    "`{}` does not conform to `{}`",
                    self.ty(subject),
                    self.decl(protocol)
                ),
                GenericRequirement::SameType { first, second } => format!(
                    "`{}` is not the same type as `{}`",
                    self.ty(first),
                    self.ty(second)
                ),
            },
        }
    }
}
