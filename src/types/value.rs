//! Reference-counted value objects.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use super::number::Number;
use super::tag;
use crate::error::ObjectError;

/// Ordered dictionary storage: keys iterate in insertion order.
pub type Entries = IndexMap<String, Value>;

/// The kind of a [`Value`]. Fixed for the lifetime of the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Boolean,
    Number,
    String,
    Data,
    Date,
    Array,
    Dictionary,
    /// A caller-registered kind, identified by its type tag (>= `tag::USER`).
    User(u8),
}

impl Kind {
    /// The TBO wire type tag for this kind.
    pub fn type_tag(self) -> u8 {
        match self {
            Self::Null => tag::NULL,
            Self::Boolean => tag::BOOLEAN,
            Self::Number => tag::NUMBER,
            Self::String => tag::STRING,
            Self::Data => tag::DATA,
            Self::Date => tag::DATE,
            Self::Array => tag::ARRAY,
            Self::Dictionary => tag::DICTIONARY,
            Self::User(t) => t,
        }
    }

    /// Whether values of this kind own child values.
    pub fn is_container(self) -> bool {
        matches!(self, Self::Array | Self::Dictionary)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean => write!(f, "boolean"),
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
            Self::Data => write!(f, "data"),
            Self::Date => write!(f, "date"),
            Self::Array => write!(f, "array"),
            Self::Dictionary => write!(f, "dictionary"),
            Self::User(t) => write!(f, "user({t})"),
        }
    }
}

/// Payload of a caller-registered kind.
///
/// The payload is shared, so copies of a user value alias the same data.
#[derive(Clone)]
pub struct UserObject {
    tag: u8,
    payload: Arc<dyn Any + Send + Sync>,
}

impl UserObject {
    pub fn new<T: Any + Send + Sync>(tag: u8, payload: T) -> Self {
        Self {
            tag,
            payload: Arc::new(payload),
        }
    }

    pub fn tag(&self) -> u8 {
        self.tag
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }
}

impl fmt::Debug for UserObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserObject").field("tag", &self.tag).finish_non_exhaustive()
    }
}

enum Node {
    Null,
    Boolean(bool),
    Number(RwLock<Number>),
    String(RwLock<String>),
    Data(RwLock<Vec<u8>>),
    Date(RwLock<i64>),
    Array(RwLock<Vec<Value>>),
    Dictionary(RwLock<Entries>),
    User(UserObject),
}

static NULL: LazyLock<Value> = LazyLock::new(|| Value::from_node(Node::Null));
static TRUE: LazyLock<Value> = LazyLock::new(|| Value::from_node(Node::Boolean(true)));
static FALSE: LazyLock<Value> = LazyLock::new(|| Value::from_node(Node::Boolean(false)));

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Serializes checked container insertions so that the cycle check and
/// the write it guards happen as one step across all values.
static LINKING: Mutex<()> = Mutex::new(());

/// A shared, reference-counted value.
///
/// Cloning a `Value` retains it and dropping one releases it; the payload is
/// destroyed (children first) when the last handle goes away. Null and the
/// two booleans are process-wide singletons with no mutators.
///
/// Handles are `Send + Sync`: counts are atomic and mutable payloads sit
/// behind a lock.
#[derive(Clone)]
pub struct Value {
    node: Arc<Node>,
}

impl Value {
    fn from_node(node: Node) -> Self {
        Self {
            node: Arc::new(node),
        }
    }

    // -- Construction --

    /// The shared null singleton.
    pub fn null() -> Self {
        NULL.clone()
    }

    /// One of the two shared boolean singletons.
    pub fn boolean(value: bool) -> Self {
        if value { TRUE.clone() } else { FALSE.clone() }
    }

    pub fn number(value: impl Into<Number>) -> Self {
        Self::from_node(Node::Number(RwLock::new(value.into())))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::from_node(Node::String(RwLock::new(value.into())))
    }

    pub fn data(value: impl Into<Vec<u8>>) -> Self {
        Self::from_node(Node::Data(RwLock::new(value.into())))
    }

    /// A date, in seconds since the Unix epoch.
    pub fn date(seconds: i64) -> Self {
        Self::from_node(Node::Date(RwLock::new(seconds)))
    }

    /// An empty array.
    pub fn array() -> Self {
        Self::array_from(Vec::new())
    }

    /// An array taking ownership of `items`.
    pub fn array_from(items: Vec<Value>) -> Self {
        Self::from_node(Node::Array(RwLock::new(items)))
    }

    /// An empty dictionary.
    pub fn dictionary() -> Self {
        Self::dictionary_from(Entries::new())
    }

    /// A dictionary taking ownership of `entries`.
    pub fn dictionary_from(entries: Entries) -> Self {
        Self::from_node(Node::Dictionary(RwLock::new(entries)))
    }

    pub fn user(object: UserObject) -> Self {
        Self::from_node(Node::User(object))
    }

    // -- Reflection and ownership --

    pub fn kind(&self) -> Kind {
        match &*self.node {
            Node::Null => Kind::Null,
            Node::Boolean(_) => Kind::Boolean,
            Node::Number(_) => Kind::Number,
            Node::String(_) => Kind::String,
            Node::Data(_) => Kind::Data,
            Node::Date(_) => Kind::Date,
            Node::Array(_) => Kind::Array,
            Node::Dictionary(_) => Kind::Dictionary,
            Node::User(u) => Kind::User(u.tag),
        }
    }

    /// Whether this is one of the immutable shared constants.
    pub fn is_singleton(&self) -> bool {
        matches!(&*self.node, Node::Null | Node::Boolean(_))
    }

    /// Number of live handles to this value.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.node)
    }

    /// Whether two handles refer to the same value instance.
    pub fn ptr_eq(a: &Value, b: &Value) -> bool {
        Arc::ptr_eq(&a.node, &b.node)
    }

    /// Returns a new handle to the same instance.
    pub fn retain(&self) -> Value {
        self.clone()
    }

    /// Gives up this handle. The value is destroyed if it was the last one.
    pub fn release(self) {
        drop(self);
    }

    /// Address of the shared node, used for identity tracking while a
    /// handle is held.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.node) as *const () as usize
    }

    /// Produces a new value of the same kind.
    ///
    /// Containers get fresh storage holding new handles to the same
    /// children, so shared children stay shared. Singletons return
    /// themselves.
    pub fn copy(&self) -> Value {
        match &*self.node {
            Node::Null | Node::Boolean(_) => self.clone(),
            Node::Number(n) => Self::number(*read(n)),
            Node::String(s) => Self::string(read(s).clone()),
            Node::Data(d) => Self::data(read(d).clone()),
            Node::Date(d) => Self::date(*read(d)),
            Node::Array(items) => Self::array_from(read(items).clone()),
            Node::Dictionary(entries) => Self::dictionary_from(read(entries).clone()),
            Node::User(u) => Self::user(u.clone()),
        }
    }

    /// Resets the payload to its empty state without replacing the value.
    ///
    /// Singletons and user values are left untouched.
    pub fn clear(&self) {
        match &*self.node {
            Node::Null | Node::Boolean(_) | Node::User(_) => {}
            Node::Number(n) => {
                let mut n = write(n);
                *n = Number::zero(n.number_type());
            }
            Node::String(s) => write(s).clear(),
            Node::Data(d) => write(d).clear(),
            Node::Date(d) => *write(d) = 0,
            Node::Array(items) => {
                // Drop children after releasing the lock.
                let old = std::mem::take(&mut *write(items));
                drop(old);
            }
            Node::Dictionary(entries) => {
                let old = std::mem::take(&mut *write(entries));
                drop(old);
            }
        }
    }

    // -- Accessors --

    pub fn as_bool(&self) -> Option<bool> {
        match &*self.node {
            Node::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match &*self.node {
            Node::Number(n) => Some(*read(n)),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match &*self.node {
            Node::String(s) => Some(read(s).clone()),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<Vec<u8>> {
        match &*self.node {
            Node::Data(d) => Some(read(d).clone()),
            _ => None,
        }
    }

    /// Date in seconds since the Unix epoch.
    pub fn as_date(&self) -> Option<i64> {
        match &*self.node {
            Node::Date(d) => Some(*read(d)),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&UserObject> {
        match &*self.node {
            Node::User(u) => Some(u),
            _ => None,
        }
    }

    /// Snapshot of an array's children (new handles, same instances).
    pub fn items(&self) -> Option<Vec<Value>> {
        match &*self.node {
            Node::Array(items) => Some(read(items).clone()),
            _ => None,
        }
    }

    /// Snapshot of a dictionary's entries in iteration order.
    pub fn entries(&self) -> Option<Vec<(String, Value)>> {
        match &*self.node {
            Node::Dictionary(entries) => Some(
                read(entries)
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Array element at `index`.
    pub fn at(&self, index: usize) -> Option<Value> {
        match &*self.node {
            Node::Array(items) => read(items).get(index).cloned(),
            _ => None,
        }
    }

    /// Dictionary value for `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        match &*self.node {
            Node::Dictionary(entries) => read(entries).get(key).cloned(),
            _ => None,
        }
    }

    /// Element count for containers, byte length for strings and data.
    pub fn len(&self) -> Option<usize> {
        match &*self.node {
            Node::String(s) => Some(read(s).len()),
            Node::Data(d) => Some(read(d).len()),
            Node::Array(items) => Some(read(items).len()),
            Node::Dictionary(entries) => Some(read(entries).len()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    // -- Mutators --

    fn wrong_kind(&self, op: &str) -> ObjectError {
        ObjectError::Invariant(format!("{op} called on a {} value", self.kind()))
    }

    pub fn set_number(&self, value: impl Into<Number>) -> Result<(), ObjectError> {
        match &*self.node {
            Node::Number(n) => {
                *write(n) = value.into();
                Ok(())
            }
            _ => Err(self.wrong_kind("set_number")),
        }
    }

    pub fn set_string(&self, value: impl Into<String>) -> Result<(), ObjectError> {
        match &*self.node {
            Node::String(s) => {
                *write(s) = value.into();
                Ok(())
            }
            _ => Err(self.wrong_kind("set_string")),
        }
    }

    pub fn set_data(&self, value: impl Into<Vec<u8>>) -> Result<(), ObjectError> {
        match &*self.node {
            Node::Data(d) => {
                *write(d) = value.into();
                Ok(())
            }
            _ => Err(self.wrong_kind("set_data")),
        }
    }

    pub fn set_date(&self, seconds: i64) -> Result<(), ObjectError> {
        match &*self.node {
            Node::Date(d) => {
                *write(d) = seconds;
                Ok(())
            }
            _ => Err(self.wrong_kind("set_date")),
        }
    }

    /// Appends `item` to an array, taking ownership of the handle.
    ///
    /// Fails if `item` is this array or contains it.
    pub fn push(&self, item: Value) -> Result<(), ObjectError> {
        match &*self.node {
            Node::Array(items) => {
                let _linking = LINKING.lock().unwrap_or_else(PoisonError::into_inner);
                self.check_acyclic(&item)?;
                write(items).push(item);
                Ok(())
            }
            _ => Err(self.wrong_kind("push")),
        }
    }

    /// Removes and returns the array element at `index`.
    pub fn remove(&self, index: usize) -> Result<Option<Value>, ObjectError> {
        match &*self.node {
            Node::Array(items) => {
                let mut items = write(items);
                Ok((index < items.len()).then(|| items.remove(index)))
            }
            _ => Err(self.wrong_kind("remove")),
        }
    }

    /// Sets `key` to `value`, returning the previous value.
    ///
    /// Fails if `value` is this dictionary or contains it.
    pub fn insert(
        &self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>, ObjectError> {
        match &*self.node {
            Node::Dictionary(entries) => {
                let _linking = LINKING.lock().unwrap_or_else(PoisonError::into_inner);
                self.check_acyclic(&value)?;
                Ok(write(entries).insert(key.into(), value))
            }
            _ => Err(self.wrong_kind("insert")),
        }
    }

    /// Removes `key`, preserving the order of the remaining entries.
    pub fn remove_key(&self, key: &str) -> Result<Option<Value>, ObjectError> {
        match &*self.node {
            Node::Dictionary(entries) => Ok(write(entries).shift_remove(key)),
            _ => Err(self.wrong_kind("remove_key")),
        }
    }

    /// Appends without the cycle check. Callers guarantee acyclicity.
    pub(crate) fn push_unchecked(&self, item: Value) {
        if let Node::Array(items) = &*self.node {
            write(items).push(item);
        }
    }

    /// Inserts without the cycle check. Callers guarantee acyclicity.
    pub(crate) fn insert_unchecked(&self, key: String, value: Value) {
        if let Node::Dictionary(entries) = &*self.node {
            write(entries).insert(key, value);
        }
    }

    fn check_acyclic(&self, child: &Value) -> Result<(), ObjectError> {
        if child.reaches(self) {
            Err(ObjectError::Invariant(format!(
                "inserting this {} would create a cycle",
                child.kind()
            )))
        } else {
            Ok(())
        }
    }

    /// Whether `target` is this value or one of its descendants.
    fn reaches(&self, target: &Value) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![self.clone()];
        while let Some(v) = stack.pop() {
            if Value::ptr_eq(&v, target) {
                return true;
            }
            if !v.kind().is_container() || !seen.insert(v.addr()) {
                continue;
            }
            match &*v.node {
                Node::Array(items) => stack.extend(read(items).iter().cloned()),
                Node::Dictionary(entries) => stack.extend(read(entries).values().cloned()),
                _ => {}
            }
        }
        false
    }
}

/// Structural equality: same kind and recursively equal payloads.
///
/// Dictionaries compare as maps (order-insensitive); numbers compare by
/// numeric value; user values compare by payload identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if Value::ptr_eq(self, other) {
            return true;
        }
        match (&*self.node, &*other.node) {
            (Node::Null, Node::Null) => true,
            (Node::Boolean(a), Node::Boolean(b)) => a == b,
            (Node::Number(a), Node::Number(b)) => *read(a) == *read(b),
            (Node::String(a), Node::String(b)) => *read(a) == *read(b),
            (Node::Data(a), Node::Data(b)) => *read(a) == *read(b),
            (Node::Date(a), Node::Date(b)) => *read(a) == *read(b),
            (Node::Array(a), Node::Array(b)) => *read(a) == *read(b),
            (Node::Dictionary(a), Node::Dictionary(b)) => {
                let (a, b) = (read(a), read(b));
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|other| v == other))
            }
            (Node::User(a), Node::User(b)) => {
                a.tag == b.tag && Arc::ptr_eq(&a.payload, &b.payload)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.node {
            Node::Null => write!(f, "Null"),
            Node::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            Node::Number(n) => f.debug_tuple("Number").field(&*read(n)).finish(),
            Node::String(s) => f.debug_tuple("String").field(&*read(s)).finish(),
            Node::Data(d) => f.debug_tuple("Data").field(&*read(d)).finish(),
            Node::Date(d) => f.debug_tuple("Date").field(&*read(d)).finish(),
            Node::Array(items) => f.debug_tuple("Array").field(&*read(items)).finish(),
            Node::Dictionary(entries) => f.debug_map().entries(read(entries).iter()).finish(),
            Node::User(u) => u.fmt(f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.node {
            Node::Null => write!(f, "null"),
            Node::Boolean(b) => write!(f, "{b}"),
            Node::Number(n) => write!(f, "{}", *read(n)),
            Node::String(s) => write!(f, "\"{}\"", *read(s)),
            Node::Data(d) => write!(f, "<{} bytes>", read(d).len()),
            Node::Date(d) => write!(f, "date({})", *read(d)),
            Node::Array(items) => {
                write!(f, "[")?;
                for (i, item) in read(items).iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Node::Dictionary(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in read(entries).iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Node::User(u) => write!(f, "<user {}>", u.tag),
        }
    }
}

// -- Convenience conversions --

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::boolean(b)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Self::number(n)
    }
}

macro_rules! value_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::number(v)
                }
            }
        )*
    };
}

value_from_number!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::string(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::data(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::array_from(items)
    }
}

impl From<Entries> for Value {
    fn from(entries: Entries) -> Self {
        Self::dictionary_from(entries)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self::dictionary_from(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NumberType;

    #[test]
    fn singletons_are_shared() {
        assert!(Value::ptr_eq(&Value::null(), &Value::null()));
        assert!(Value::ptr_eq(&Value::boolean(true), &Value::from(true)));
        assert!(!Value::ptr_eq(&Value::boolean(true), &Value::boolean(false)));
        assert!(Value::null().is_singleton());
        assert!(!Value::number(1u8).is_singleton());
    }

    #[test]
    fn singletons_ignore_clear() {
        let t = Value::boolean(true);
        t.clear();
        assert_eq!(t.as_bool(), Some(true));
        assert!(t.copy().is_singleton());
    }

    #[test]
    fn kind_is_fixed() {
        let v = Value::string("abc");
        assert_eq!(v.kind(), Kind::String);
        assert!(v.set_number(3u8).is_err());
        v.clear();
        assert_eq!(v.kind(), Kind::String);
        assert_eq!(v.as_string().as_deref(), Some(""));
    }

    #[test]
    fn retain_release_restores_count() {
        let v = Value::data(vec![1, 2, 3]);
        assert_eq!(v.ref_count(), 1);
        let extra = v.retain();
        assert_eq!(v.ref_count(), 2);
        extra.release();
        assert_eq!(v.ref_count(), 1);
    }

    #[test]
    fn container_release_drops_children_once() {
        let shared = Value::string("x");
        let array = Value::array();
        array.push(shared.clone()).unwrap();
        array.push(shared.clone()).unwrap();
        assert_eq!(shared.ref_count(), 3);
        drop(array);
        assert_eq!(shared.ref_count(), 1);
    }

    #[test]
    fn copy_shares_children() {
        let child = Value::string("child");
        let array = Value::array_from(vec![child.clone()]);
        let copy = array.copy();
        assert!(!Value::ptr_eq(&array, &copy));
        assert!(Value::ptr_eq(&copy.at(0).unwrap(), &child));
        assert_eq!(child.ref_count(), 3);
    }

    #[test]
    fn copy_is_idempotent() {
        let dict: Value = [
            ("a", Value::number(1u8)),
            ("b", Value::array_from(vec![Value::null(), Value::from("s")])),
        ]
        .into_iter()
        .collect();
        let before = format!("{dict}");
        let twice = dict.copy().copy();
        assert_eq!(twice, dict);
        assert_eq!(format!("{dict}"), before);
    }

    #[test]
    fn clear_resets_payloads() {
        let n = Value::number(-5i16);
        n.clear();
        assert_eq!(n.as_number().map(|n| n.number_type()), Some(NumberType::I16));
        assert_eq!(n.as_number().and_then(|n| n.as_i64()), Some(0));

        let dict: Value = [("k", Value::null())].into_iter().collect();
        dict.clear();
        assert!(dict.is_empty());
    }

    #[test]
    fn push_rejects_cycles() {
        let outer = Value::array();
        let inner = Value::array();
        outer.push(inner.clone()).unwrap();
        assert!(matches!(outer.push(outer.clone()), Err(ObjectError::Invariant(_))));
        assert!(matches!(inner.push(outer.clone()), Err(ObjectError::Invariant(_))));

        let dict = Value::dictionary();
        inner.push(dict.clone()).unwrap();
        assert!(dict.insert("loop", outer.clone()).is_err());
    }

    #[test]
    fn concurrent_cross_links_never_form_a_cycle() {
        for _ in 0..200 {
            let a = Value::array();
            let b = Value::dictionary();
            let barrier = Arc::new(std::sync::Barrier::new(2));

            let (a2, b2, gate) = (a.clone(), b.clone(), barrier.clone());
            let t = std::thread::spawn(move || {
                gate.wait();
                a2.push(b2).is_ok()
            });
            barrier.wait();
            let linked_b = b.insert("a", a.clone()).is_ok();
            let linked_a = t.join().unwrap();
            assert!(!(linked_a && linked_b));
            assert!(linked_a || linked_b);

            // Break whichever edge formed so both values can be freed.
            a.clear();
            b.clear();
        }
    }

    #[test]
    fn dag_sharing_is_allowed() {
        let leaf = Value::array();
        let outer = Value::array();
        outer.push(leaf.clone()).unwrap();
        outer.push(leaf.clone()).unwrap();
        assert_eq!(outer.len(), Some(2));
    }

    #[test]
    fn dictionary_keeps_insertion_order() {
        let dict = Value::dictionary();
        dict.insert("z", Value::from(1u8)).unwrap();
        dict.insert("a", Value::from(2u8)).unwrap();
        dict.insert("m", Value::from(3u8)).unwrap();
        let keys: Vec<String> = dict.entries().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["z", "a", "m"]);

        dict.remove_key("a").unwrap();
        let keys: Vec<String> = dict.entries().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["z", "m"]);
    }

    #[test]
    fn structural_equality() {
        let a: Value = [("n", Value::from(3u8)), ("s", Value::from("x"))]
            .into_iter()
            .collect();
        let b: Value = [("s", Value::from("x")), ("n", Value::from(3i64))]
            .into_iter()
            .collect();
        assert_eq!(a, b);
        assert_ne!(Value::from("1"), Value::from(1u8));
        assert_ne!(Value::array(), Value::dictionary());
    }

    #[test]
    fn user_values_compare_by_identity() {
        let u = Value::user(UserObject::new(tag::USER, 42u32));
        assert_eq!(u.kind(), Kind::User(tag::USER));
        assert_eq!(u.copy(), u);
        assert_ne!(u, Value::user(UserObject::new(tag::USER, 42u32)));
        assert_eq!(u.as_user().and_then(|o| o.downcast_ref::<u32>()), Some(&42));
    }

    #[test]
    fn display() {
        let v = Value::array_from(vec![
            Value::null(),
            Value::from(true),
            Value::from("s"),
            Value::data(vec![0; 4]),
        ]);
        assert_eq!(v.to_string(), "[null, true, \"s\", <4 bytes>]");
    }
}
