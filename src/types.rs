//! The value-type lattice of the target language.
//!
//! A [`Type`] is a variant ([`TypeKind`]) plus an orthogonal nullability
//! flag. Types are plain structural values; the process-wide state is the
//! [`TypeCatalog`], which decides which variants carry a [`Group`] and is
//! frozen once installed.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use itertools::Itertools;
use num_bigint::BigInt;

use crate::error::{IrErrorKind, IrResult};
use crate::group::{DoubleGroup, Group, IntegerGroup, ProductGroup};

/// Widest `signed<N>` or `bit<N>` the front end accepts.
pub const MAX_INTEGER_WIDTH: u32 = 4096;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Bool,
    BigInt,
    Signed(u32),
    Bit(u32),
    Double,
    String,
    Tuple(Vec<Type>),
    Vector(Box<Type>),
}

/// Variant tag without payload, used to key the [`TypeCatalog`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Bool,
    BigInt,
    Signed,
    Bit,
    Double,
    String,
    Tuple,
    Vector,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Type {
    kind: TypeKind,
    may_be_null: bool,
}

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            may_be_null: false,
        }
    }

    pub fn bool() -> Self {
        Self::new(TypeKind::Bool)
    }

    pub fn bigint() -> Self {
        Self::new(TypeKind::BigInt)
    }

    pub fn signed(width: u32) -> Self {
        Self::new(TypeKind::Signed(width))
    }

    pub fn bit(width: u32) -> Self {
        Self::new(TypeKind::Bit(width))
    }

    pub fn double() -> Self {
        Self::new(TypeKind::Double)
    }

    pub fn string() -> Self {
        Self::new(TypeKind::String)
    }

    pub fn tuple(components: Vec<Type>) -> Self {
        Self::new(TypeKind::Tuple(components))
    }

    pub fn vector(element: Type) -> Self {
        Self::new(TypeKind::Vector(Box::new(element)))
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn tag(&self) -> TypeTag {
        match self.kind {
            TypeKind::Bool => TypeTag::Bool,
            TypeKind::BigInt => TypeTag::BigInt,
            TypeKind::Signed(_) => TypeTag::Signed,
            TypeKind::Bit(_) => TypeTag::Bit,
            TypeKind::Double => TypeTag::Double,
            TypeKind::String => TypeTag::String,
            TypeKind::Tuple(_) => TypeTag::Tuple,
            TypeKind::Vector(_) => TypeTag::Vector,
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.may_be_null
    }

    /// The nullable counterpart of this type. Idempotent.
    pub fn nullable(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            may_be_null: true,
        }
    }

    pub fn non_null(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            may_be_null: false,
        }
    }

    /// True only for the non-nullable `bool`.
    pub fn is_bool(&self) -> bool {
        !self.may_be_null && self.kind == TypeKind::Bool
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::BigInt | TypeKind::Signed(_) | TypeKind::Bit(_)
        )
    }

    /// Inclusive range of a fixed-width integer type. Zero-width types hold
    /// only 0. `None` for `bigint` and non-integral types.
    pub fn integer_bounds(&self) -> Option<(BigInt, BigInt)> {
        match self.kind {
            TypeKind::Signed(0) | TypeKind::Bit(0) => Some((BigInt::from(0), BigInt::from(0))),
            TypeKind::Signed(width) => {
                let half = BigInt::from(1) << (width as usize - 1);
                Some((-half.clone(), half - 1))
            }
            TypeKind::Bit(width) => Some((BigInt::from(0), (BigInt::from(1) << width as usize) - 1)),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integral() || self.kind == TypeKind::Double
    }

    pub fn is_compatible(&self, other: &Type, relax_nullability: bool) -> bool {
        self.kind == other.kind && (relax_nullability || self.may_be_null == other.may_be_null)
    }

    fn fmt_non_null(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Bool => f.write_str("bool"),
            TypeKind::BigInt => f.write_str("bigint"),
            TypeKind::Signed(width) => write!(f, "signed<{}>", width),
            TypeKind::Bit(width) => write!(f, "bit<{}>", width),
            TypeKind::Double => f.write_str("double"),
            TypeKind::String => f.write_str("string"),
            TypeKind::Tuple(components) => write!(f, "({})", components.iter().join(", ")),
            TypeKind::Vector(element) => write!(f, "Vec<{}>", element),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.may_be_null {
            f.write_str("Option<")?;
            self.fmt_non_null(f)?;
            f.write_str(">")
        } else {
            self.fmt_non_null(f)
        }
    }
}

/// Checks that `actual` can stand where `expected` is wanted.
///
/// The non-null variants must be structurally identical. Unless
/// `relax_nullability` is set, the nullability flags must match as well.
pub fn check_compatible(expected: &Type, actual: &Type, relax_nullability: bool) -> IrResult<()> {
    check_compatible_in("expression", expected, actual, relax_nullability)
}

pub(crate) fn check_compatible_in(
    context: &'static str,
    expected: &Type,
    actual: &Type,
    relax_nullability: bool,
) -> IrResult<()> {
    if expected.is_compatible(actual, relax_nullability) {
        Ok(())
    } else {
        Err(IrErrorKind::TypeMismatch {
            context,
            expected: expected.clone(),
            found: actual.clone(),
        }
        .into())
    }
}

pub type GroupFactory = fn(&TypeCatalog, &Type) -> Option<Arc<dyn Group>>;

static GLOBAL_CATALOG: OnceLock<TypeCatalog> = OnceLock::new();

/// Decides which type variants are aggregable and builds their groups.
#[derive(Clone)]
pub struct TypeCatalog {
    factories: HashMap<TypeTag, GroupFactory>,
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags = self
            .factories
            .keys()
            .map(|tag| format!("{:?}", tag))
            .sorted()
            .collect::<Vec<_>>();
        f.debug_struct("TypeCatalog")
            .field("aggregable", &tags)
            .finish()
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.register(TypeTag::BigInt, |_, ty| {
            Some(Arc::new(IntegerGroup::new(ty.non_null())))
        });
        catalog.register(TypeTag::Signed, |_, ty| {
            Some(Arc::new(IntegerGroup::new(ty.non_null())))
        });
        catalog.register(TypeTag::Bit, |_, ty| {
            Some(Arc::new(IntegerGroup::new(ty.non_null())))
        });
        catalog.register(TypeTag::Double, |_, ty| {
            Some(Arc::new(DoubleGroup::new(ty.non_null())))
        });
        catalog.register(TypeTag::Tuple, |catalog, ty| {
            let TypeKind::Tuple(components) = ty.kind() else {
                return None;
            };
            let groups = components
                .iter()
                .map(|component| catalog.group_of(component))
                .collect::<Option<Vec<_>>>()?;
            Some(Arc::new(ProductGroup::new(ty.non_null(), groups)))
        });
        catalog
    }
}

impl TypeCatalog {
    /// A catalog in which no type is aggregable.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, tag: TypeTag, factory: GroupFactory) -> &mut Self {
        self.factories.insert(tag, factory);
        self
    }

    pub fn is_aggregable(&self, tag: TypeTag) -> bool {
        self.factories.contains_key(&tag)
    }

    /// The group of `ty`'s variant, if it has one. Nullability is ignored.
    pub fn group_of(&self, ty: &Type) -> Option<Arc<dyn Group>> {
        let factory = self.factories.get(&ty.tag())?;
        factory(self, ty)
    }

    pub fn require_group(&self, ty: &Type) -> IrResult<Arc<dyn Group>> {
        self.group_of(ty)
            .ok_or_else(|| IrErrorKind::NoGroupForType { ty: ty.clone() }.into())
    }

    /// Freezes `self` as the process-wide catalog. Fails, returning the
    /// rejected catalog, if one was already installed.
    pub fn install(self) -> Result<(), TypeCatalog> {
        let tags = self.factories.len();
        GLOBAL_CATALOG.set(self)?;
        tracing::debug!(aggregable = tags, "type catalog installed");
        Ok(())
    }

    /// The installed catalog, installing the default one on first use.
    pub fn global() -> &'static TypeCatalog {
        GLOBAL_CATALOG.get_or_init(TypeCatalog::default)
    }
}

pub fn group_of(ty: &Type) -> Option<Arc<dyn Group>> {
    TypeCatalog::global().group_of(ty)
}

pub fn require_group(ty: &Type) -> IrResult<Arc<dyn Group>> {
    TypeCatalog::global().require_group(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IrErrorKind;

    fn samples() -> Vec<Type> {
        vec![
            Type::bool(),
            Type::bigint(),
            Type::signed(64),
            Type::bit(8),
            Type::double(),
            Type::string(),
            Type::tuple(vec![Type::bigint(), Type::string().nullable()]),
            Type::vector(Type::bool()),
        ]
    }

    #[test]
    fn test_relaxed_compatibility_is_symmetric() {
        for ty in samples() {
            let nullable = ty.nullable();
            assert!(check_compatible(&nullable, &ty, true).is_ok());
            assert!(check_compatible(&ty, &nullable, true).is_ok());
        }
    }

    #[test]
    fn test_strict_compatibility_requires_equal_nullability() {
        for ty in samples() {
            let nullable = ty.nullable();
            assert!(check_compatible(&ty, &ty, false).is_ok());
            assert!(check_compatible(&nullable, &nullable, false).is_ok());

            let err = check_compatible(&ty, &nullable, false).unwrap_err();
            assert_eq!(
                err.kind(),
                &IrErrorKind::TypeMismatch {
                    context: "expression",
                    expected: ty.clone(),
                    found: nullable.clone(),
                }
            );
            assert!(check_compatible(&nullable, &ty, false).is_err());
        }
    }

    #[test]
    fn test_different_variants_are_incompatible() {
        assert!(!Type::signed(32).is_compatible(&Type::signed(64), true));
        assert!(!Type::bigint().is_compatible(&Type::string(), true));
        assert!(!Type::tuple(vec![Type::bigint()])
            .is_compatible(&Type::tuple(vec![Type::bigint().nullable()]), true));
    }

    #[test]
    fn test_nullable_is_idempotent() {
        for ty in samples() {
            assert_eq!(ty.nullable(), ty.nullable().nullable());
            assert_eq!(ty.nullable().non_null(), ty);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::signed(64).to_string(), "signed<64>");
        assert_eq!(Type::string().nullable().to_string(), "Option<string>");
        assert_eq!(
            Type::tuple(vec![Type::bit(8), Type::vector(Type::bool())]).to_string(),
            "(bit<8>, Vec<bool>)"
        );
    }

    #[test]
    fn test_no_group_is_not_an_error() {
        assert!(group_of(&Type::string()).is_none());
        assert!(group_of(&Type::bool()).is_none());
        assert!(group_of(&Type::vector(Type::bigint())).is_none());
        assert!(group_of(&Type::tuple(vec![Type::bigint(), Type::string()])).is_none());
    }

    #[test]
    fn test_require_group_reports_missing_group() {
        let err = require_group(&Type::string()).unwrap_err();
        assert_eq!(
            err.kind(),
            &IrErrorKind::NoGroupForType { ty: Type::string() }
        );
    }

    #[test]
    fn test_group_lookup_ignores_nullability() {
        let group = group_of(&Type::signed(32).nullable()).unwrap();
        assert_eq!(group.element_type(), Type::signed(32));
    }

    #[test]
    fn test_integer_bounds() {
        let bounds = |ty: Type| ty.integer_bounds().map(|(min, max)| (min.to_string(), max.to_string()));
        let range = |min: &str, max: &str| Some((min.to_owned(), max.to_owned()));
        assert_eq!(bounds(Type::signed(8)), range("-128", "127"));
        assert_eq!(bounds(Type::bit(8)), range("0", "255"));
        assert_eq!(bounds(Type::signed(1)), range("-1", "0"));
        assert_eq!(bounds(Type::signed(0)), range("0", "0"));
        assert_eq!(bounds(Type::bit(0)), range("0", "0"));
        assert_eq!(bounds(Type::bigint()), None);
        assert_eq!(bounds(Type::double()), None);
    }

    #[test]
    fn test_group_bearing_set_is_configurable() {
        let mut catalog = TypeCatalog::empty();
        assert!(catalog.group_of(&Type::bigint()).is_none());

        catalog.register(TypeTag::BigInt, |_, ty| {
            Some(Arc::new(IntegerGroup::new(ty.non_null())))
        });
        assert!(catalog.is_aggregable(TypeTag::BigInt));
        assert!(catalog.group_of(&Type::bigint()).is_some());
        assert!(catalog.group_of(&Type::double()).is_none());
    }
}
