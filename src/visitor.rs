/// Defines state that is built during [`crate::Generator::generate`].
///
/// This is implemented for
/// - [`DrawState`] to keep the value of every terminal as a separate fragment
/// - `String` to produce the generated string directly
/// - `Vec<u8>` to produce its UTF-8 bytes
/// - `u64` to produce an equivalence class ID of the derivation: two runs that make the same
///   expansion choices and insert the same ignored symbols get the same ID, whatever the
///   terminal values.
/// - tuples of visitors, to build several at once, e.g. `(String, u64)`
///
/// Ignored symbols are drawn like any other symbol, so their values reach `visit_terminal`
/// (and their rules `visit_rule`) before `visit_ignore` is called.
pub trait Visitor {
    fn new() -> Self;
    /// Rule `rule` was expanded with its `expansion`th alternative, shortest first.
    fn visit_rule(&mut self, _rule: &str, _expansion: usize) {}
    fn visit_terminal(&mut self, _name: &str, _value: &str) {}
    fn visit_ignore(&mut self) {}
}

/// The values of the terminals drawn during one run, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawState {
    result: Vec<String>,
}

impl DrawState {
    pub fn fragments(&self) -> &[String] {
        &self.result
    }

    /// Joins the fragments, with no separator.
    pub fn into_string(self) -> String {
        self.result.concat()
    }
}

impl Visitor for DrawState {
    fn new() -> Self {
        Default::default()
    }
    fn visit_terminal(&mut self, _name: &str, value: &str) {
        self.result.push(value.to_string());
    }
}

/// Returns the generated string.
impl Visitor for String {
    fn new() -> Self {
        Default::default()
    }
    fn visit_terminal(&mut self, _name: &str, value: &str) {
        self.push_str(value);
    }
}

/// Returns the generated string as bytes.
impl Visitor for Vec<u8> {
    fn new() -> Self {
        Default::default()
    }
    fn visit_terminal(&mut self, _name: &str, value: &str) {
        self.extend(value.as_bytes());
    }
}

fn id_hash(val: &mut u64, rule_id: u64) {
    *val = fxhash::hash64(&(rule_id, *val));
}

/// Returns an identifier of the derivation.
impl Visitor for u64 {
    fn new() -> Self {
        u64::MAX
    }
    fn visit_rule(&mut self, rule: &str, expansion: usize) {
        id_hash(self, fxhash::hash64(&(0, rule, expansion as u64)))
    }
    fn visit_terminal(&mut self, name: &str, _: &str) {
        id_hash(self, fxhash::hash64(&(1, name)))
    }
    fn visit_ignore(&mut self) {
        id_hash(self, 2)
    }
}

macro_rules! impl_visitor_tuple {
    ( $($name:ident)+) => (
        #[allow(non_snake_case)]
        impl<$($name: Visitor),+> Visitor for ($($name,)+) {
            fn new() -> ($($name,)+) {
                ($({ let x: $name = Visitor::new(); x},)+)
            }

            fn visit_rule(&mut self, rule: &str, expansion: usize) {
                let ($(ref mut $name,)+) = *self;
                $($name.visit_rule(rule, expansion);)+
            }
            fn visit_terminal(&mut self, name: &str, value: &str) {
                let ($(ref mut $name,)+) = *self;
                $($name.visit_terminal(name, value);)+
            }
            fn visit_ignore(&mut self) {
                let ($(ref mut $name,)+) = *self;
                $($name.visit_ignore();)+
            }
        }
    );
}

impl_visitor_tuple! { T }
impl_visitor_tuple! { T B }
impl_visitor_tuple! { T B C }
impl_visitor_tuple! { T B C D }

#[cfg(test)]
mod tests {
    use super::*;

    fn run<V: Visitor>(events: &[(&str, &str)]) -> V {
        let mut v = V::new();
        for &(name, value) in events {
            match name {
                "" => v.visit_ignore(),
                _ if name.starts_with(char::is_lowercase) => v.visit_rule(name, value.len()),
                _ => v.visit_terminal(name, value),
            }
        }
        v
    }

    #[test]
    fn strings_and_bytes() {
        let events = [("start", ""), ("A", "x"), ("WS", " "), ("", ""), ("B", "é")];
        let (s, b, d): (String, Vec<u8>, DrawState) = run(&events);
        assert_eq!(s, "x é");
        assert_eq!(b, "x é".as_bytes());
        assert_eq!(d.fragments(), ["x", " ", "é"]);
        assert_eq!(d.into_string(), s);
    }

    #[test]
    fn class_ids_ignore_values() {
        let a: u64 = run(&[("start", "."), ("A", "x"), ("A", "y")]);
        let b: u64 = run(&[("start", "."), ("A", "zz"), ("A", "")]);
        let c: u64 = run(&[("start", ".."), ("A", "x"), ("A", "y")]);
        let d: u64 = run(&[("start", "."), ("A", "x"), ("", ""), ("A", "y")]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }
}
