//! Class registry
//!
//! All classes and modules live in one arena indexed by [`ClassId`]. The
//! builtin classes occupy fixed slots so that a value's class can be derived
//! without touching the registry; user classes are appended by `def_class`.
//!
//! The arena sits behind a single `RwLock`. Method and constant lookups take
//! the read lock once and walk the whole chain under it; definitions take the
//! write lock, which serializes concurrent writers.

use crate::class::{Builtin, ClassId, ClassRecord, MethodRef};
use crate::error::ErrorKind;
use crate::object::InstanceObject;
use crate::value::Value;
use parking_lot::RwLock;

/// Names of the builtin classes, in [`ClassId`] order
const BUILTIN_CLASSES: [&str; 19] = [
    "Object", "Class", "Integer", "Float", "Decimal", "Boolean", "Null", "String", "Array",
    "Hash", "Range", "Block", "Method", "Regexp", "MatchData", "Time", "Channel", "GoObject",
    "Error",
];

/// Registry of every class and module of a VM
#[derive(Debug)]
pub struct ClassRegistry {
    classes: RwLock<Vec<ClassRecord>>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    /// Create a registry holding the builtin classes
    ///
    /// Every builtin class inherits from Object and is bound as a constant
    /// of Object. The error kinds inherit from Error.
    pub fn new() -> Self {
        let mut records = Vec::with_capacity(64);
        for (index, name) in BUILTIN_CLASSES.iter().enumerate() {
            let superclass = if index == 0 { None } else { Some(ClassId::OBJECT) };
            records.push(ClassRecord::new(*name, superclass, false));
        }
        for kind in ErrorKind::ALL {
            records.push(ClassRecord::new(kind.name(), Some(ClassId::ERROR), false));
        }

        let constants: Vec<(String, Value)> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), Value::Class(ClassId(i as u32))))
            .collect();
        records[ClassId::OBJECT.index()].constants.extend(constants);

        Self {
            classes: RwLock::new(records),
        }
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }

    // ========================================================================
    // Class management
    // ========================================================================

    /// Create an empty class or module
    ///
    /// The superclass defaults to Object for classes; modules have none. The
    /// class is not bound as a constant.
    pub fn initialize_class(&self, name: &str, is_module: bool) -> ClassId {
        let superclass = if is_module { None } else { Some(ClassId::OBJECT) };
        let mut classes = self.classes.write();
        let id = ClassId(classes.len() as u32);
        classes.push(ClassRecord::new(name, superclass, is_module));
        log::debug!("created {} {} {}", if is_module { "module" } else { "class" }, name, id);
        id
    }

    /// Create a class bound as constant `name` of `scope`
    pub fn define_class(&self, name: &str, is_module: bool, scope: ClassId) -> ClassId {
        let id = self.initialize_class(name, is_module);
        let mut classes = self.classes.write();
        classes[id.index()].scope = Some(scope);
        classes[scope.index()]
            .constants
            .insert(name.to_string(), Value::Class(id));
        id
    }

    /// Set the superclass of `class`
    ///
    /// # Errors
    ///
    /// Returns the error message when `superclass` is a module.
    pub fn set_superclass(&self, class: ClassId, superclass: ClassId) -> Result<(), String> {
        let mut classes = self.classes.write();
        if classes[superclass.index()].is_module {
            return Err(format!(
                "Module inheritance is not supported: {}",
                classes[superclass.index()].name
            ));
        }
        classes[class.index()].superclass = Some(superclass);
        Ok(())
    }

    /// Class name
    pub fn name(&self, class: ClassId) -> String {
        self.classes
            .read()
            .get(class.index())
            .map(|r| r.name.clone())
            .unwrap_or_default()
    }

    /// Superclass
    pub fn superclass(&self, class: ClassId) -> Option<ClassId> {
        self.classes.read()[class.index()].superclass
    }

    /// Enclosing scope
    pub fn scope(&self, class: ClassId) -> Option<ClassId> {
        self.classes.read()[class.index()].scope
    }

    /// Whether `class` is a module
    pub fn is_module(&self, class: ClassId) -> bool {
        self.classes.read()[class.index()].is_module
    }

    /// Whether `class` is a singleton class
    pub fn is_singleton(&self, class: ClassId) -> bool {
        self.classes.read()[class.index()].is_singleton
    }

    /// First non-singleton class at or above `class`
    pub fn real_class(&self, class: ClassId) -> ClassId {
        let classes = self.classes.read();
        let mut current = class;
        while classes[current.index()].is_singleton {
            match classes[current.index()].superclass {
                Some(sup) => current = sup,
                None => break,
            }
        }
        current
    }

    /// Class of a value with singleton classes skipped
    pub fn class_of(&self, value: &Value) -> ClassId {
        self.real_class(value.class_id())
    }

    /// Name of the class of a value
    pub fn class_name_of(&self, value: &Value) -> String {
        self.name(self.class_of(value))
    }

    /// Singleton class of an instance, created on first use
    ///
    /// The singleton's superclass is the instance's current class.
    pub fn create_singleton_class(&self, instance: &InstanceObject) -> ClassId {
        let current = instance.class();
        let mut classes = self.classes.write();
        if classes[current.index()].is_singleton {
            return current;
        }
        let id = ClassId(classes.len() as u32);
        let name = format!("#<Class:{}>", classes[current.index()].name);
        let mut record = ClassRecord::new(name, Some(current), false);
        record.is_singleton = true;
        classes.push(record);
        instance.set_class(id);
        id
    }

    // ========================================================================
    // Methods
    // ========================================================================

    /// Register builtin methods on the instance or class side
    pub fn install_builtin(&self, class: ClassId, methods: &[Builtin], class_side: bool) {
        let mut classes = self.classes.write();
        let record = &mut classes[class.index()];
        let table = if class_side {
            &mut record.class_methods
        } else {
            &mut record.methods
        };
        for method in methods {
            table.insert(method.name.to_string(), MethodRef::Builtin(*method));
        }
    }

    /// Define an instance method
    pub fn define_method(&self, class: ClassId, name: &str, method: MethodRef) {
        self.classes.write()[class.index()]
            .methods
            .insert(name.to_string(), method);
    }

    /// Define a class method
    pub fn define_class_method(&self, class: ClassId, name: &str, method: MethodRef) {
        self.classes.write()[class.index()]
            .class_methods
            .insert(name.to_string(), method);
    }

    /// Find an instance method on the closest ancestor defining it
    pub fn lookup_instance_method(&self, class: ClassId, name: &str) -> Option<MethodRef> {
        let classes = self.classes.read();
        ancestors_of(&classes, class)
            .into_iter()
            .find_map(|c| classes[c.index()].methods.get(name).cloned())
    }

    /// Find a class method
    ///
    /// Walks the class-method tables up the superclass chain, then falls
    /// back to the instance methods of Class (and so of Object).
    pub fn lookup_class_method(&self, class: ClassId, name: &str) -> Option<MethodRef> {
        {
            let classes = self.classes.read();
            let mut current = Some(class);
            while let Some(c) = current {
                if let Some(method) = classes[c.index()].class_methods.get(name) {
                    return Some(method.clone());
                }
                current = classes[c.index()].superclass;
            }
        }
        self.lookup_instance_method(ClassId::CLASS, name)
    }

    /// Find the method `name` for a receiver
    pub fn lookup_method(&self, receiver: &Value, name: &str) -> Option<MethodRef> {
        match receiver {
            Value::Class(class) => self.lookup_class_method(*class, name),
            other => self.lookup_instance_method(other.class_id(), name),
        }
    }

    /// Instance method names visible on `class`, sorted
    pub fn method_names(&self, class: ClassId) -> Vec<String> {
        let classes = self.classes.read();
        let mut names: Vec<String> = ancestors_of(&classes, class)
            .into_iter()
            .flat_map(|c| classes[c.index()].methods.keys().cloned().collect::<Vec<_>>())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Instance method names defined directly on `class`, sorted
    pub fn own_method_names(&self, class: ClassId) -> Vec<String> {
        let mut names: Vec<String> = self.classes.read()[class.index()]
            .methods
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Class method names visible on `class`, sorted
    pub fn class_method_names(&self, class: ClassId) -> Vec<String> {
        let mut names = Vec::new();
        {
            let classes = self.classes.read();
            let mut current = Some(class);
            while let Some(c) = current {
                names.extend(classes[c.index()].class_methods.keys().cloned());
                current = classes[c.index()].superclass;
            }
        }
        names.extend(self.method_names(ClassId::CLASS));
        names.sort();
        names.dedup();
        names
    }

    /// Copy the instance methods of `module` into the class methods of `class`
    pub fn extend_module(&self, class: ClassId, module: ClassId) {
        let mut classes = self.classes.write();
        let methods: Vec<(String, MethodRef)> = classes[module.index()]
            .methods
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        classes[class.index()].class_methods.extend(methods);
    }

    /// Insert `module` directly above `class` in its lookup chain
    pub fn include_module(&self, class: ClassId, module: ClassId) {
        let mut classes = self.classes.write();
        let includes = &mut classes[class.index()].includes;
        if !includes.contains(&module) {
            includes.push(module);
        }
    }

    /// Lookup chain of `class`: itself, included modules (latest first),
    /// then the ancestors of its superclass
    pub fn ancestors(&self, class: ClassId) -> Vec<ClassId> {
        ancestors_of(&self.classes.read(), class)
    }

    /// Whether `target` appears in the lookup chain of `class`
    pub fn is_a(&self, class: ClassId, target: ClassId) -> bool {
        self.ancestors(class).contains(&target)
    }

    // ========================================================================
    // Constants and class-level instance variables
    // ========================================================================

    /// Constant bound in the own table of `class`
    pub fn constant(&self, class: ClassId, name: &str) -> Option<Value> {
        self.classes.read()[class.index()].constants.get(name).cloned()
    }

    /// Bind a constant in the own table of `class`
    ///
    /// Returns false, leaving the table untouched, if `name` is already bound.
    pub fn set_constant(&self, class: ClassId, name: &str, value: Value) -> bool {
        let mut classes = self.classes.write();
        let constants = &mut classes[class.index()].constants;
        if constants.contains_key(name) {
            return false;
        }
        constants.insert(name.to_string(), value);
        true
    }

    /// Resolve a constant from the scope of `start`
    ///
    /// Search order: the own table, the enclosing scopes innermost first,
    /// the inheritance chain, then Object.
    pub fn lookup_constant(&self, start: ClassId, name: &str) -> Option<Value> {
        let classes = self.classes.read();
        let table = |c: ClassId| classes[c.index()].constants.get(name).cloned();

        if let Some(value) = table(start) {
            return Some(value);
        }
        let mut scope = classes[start.index()].scope;
        while let Some(s) = scope {
            if let Some(value) = table(s) {
                return Some(value);
            }
            scope = classes[s.index()].scope;
        }
        ancestors_of(&classes, start)
            .into_iter()
            .skip(1)
            .find_map(table)
            .or_else(|| table(ClassId::OBJECT))
    }

    /// Resolve `name` inside namespace `ns` (`Ns::Name`): own table and ancestors
    pub fn lookup_constant_in_namespace(&self, ns: ClassId, name: &str) -> Option<Value> {
        let classes = self.classes.read();
        ancestors_of(&classes, ns)
            .into_iter()
            .find_map(|c| classes[c.index()].constants.get(name).cloned())
    }

    /// Class-level instance variable
    pub fn ivar(&self, class: ClassId, name: &str) -> Option<Value> {
        self.classes.read()[class.index()].ivars.get(name).cloned()
    }

    /// Set a class-level instance variable
    pub fn set_ivar(&self, class: ClassId, name: &str, value: Value) {
        self.classes.write()[class.index()]
            .ivars
            .insert(name.to_string(), value);
    }

    /// Class-level instance variable names, sorted
    pub fn ivar_names(&self, class: ClassId) -> Vec<String> {
        let mut names: Vec<String> = self.classes.read()[class.index()]
            .ivars
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

fn ancestors_of(classes: &[ClassRecord], class: ClassId) -> Vec<ClassId> {
    let mut out = Vec::new();
    collect_ancestors(classes, class, &mut out);
    out
}

fn collect_ancestors(classes: &[ClassRecord], class: ClassId, out: &mut Vec<ClassId>) {
    if out.contains(&class) {
        return;
    }
    out.push(class);
    let record = &classes[class.index()];
    for module in record.includes.iter().rev() {
        collect_ancestors(classes, *module, out);
    }
    if let Some(sup) = record.superclass {
        collect_ancestors(classes, sup, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{Call, Interrupt};

    fn stub(_call: &mut Call<'_>) -> Result<Value, Interrupt> {
        Ok(Value::Null)
    }

    #[test]
    fn test_builtin_classes() {
        let registry = ClassRegistry::new();
        assert_eq!(registry.name(ClassId::OBJECT), "Object");
        assert_eq!(registry.name(ClassId::ERROR), "Error");
        assert_eq!(
            registry.name(ErrorKind::NameError.class_id()),
            "NameError"
        );
        assert!(registry.is_a(ErrorKind::TypeError.class_id(), ClassId::ERROR));
        assert!(matches!(
            registry.lookup_constant(ClassId::STRING, "Array"),
            Some(Value::Class(ClassId::ARRAY))
        ));
    }

    #[test]
    fn test_every_class_reaches_object() {
        let registry = ClassRegistry::new();
        let foo = registry.define_class("Foo", false, ClassId::OBJECT);
        for i in 0..registry.len() {
            assert_eq!(*registry.ancestors(ClassId(i as u32)).last().unwrap(), ClassId::OBJECT);
        }
        assert_eq!(registry.superclass(foo), Some(ClassId::OBJECT));
    }

    #[test]
    fn test_module_inheritance_rejected() {
        let registry = ClassRegistry::new();
        let module = registry.define_class("Mod", true, ClassId::OBJECT);
        let class = registry.define_class("Foo", false, ClassId::OBJECT);
        let err = registry.set_superclass(class, module).unwrap_err();
        assert_eq!(err, "Module inheritance is not supported: Mod");
        assert_eq!(registry.superclass(class), Some(ClassId::OBJECT));
    }

    #[test]
    fn test_closest_ancestor_wins() {
        let registry = ClassRegistry::new();
        let base = registry.define_class("Base", false, ClassId::OBJECT);
        let derived = registry.define_class("Derived", false, ClassId::OBJECT);
        registry.set_superclass(derived, base).unwrap();

        registry.install_builtin(base, &[Builtin::new("foo", stub), Builtin::new("bar", stub)], false);
        registry.install_builtin(derived, &[Builtin::new("foo", stub)], false);

        assert!(registry.lookup_instance_method(derived, "bar").is_some());
        assert!(registry.lookup_instance_method(derived, "missing").is_none());
        assert_eq!(registry.ancestors(derived)[..2], [derived, base]);
    }

    #[test]
    fn test_included_module_precedes_superclass() {
        let registry = ClassRegistry::new();
        let module = registry.define_class("Greet", true, ClassId::OBJECT);
        let class = registry.define_class("Foo", false, ClassId::OBJECT);
        registry.include_module(class, module);
        assert_eq!(registry.ancestors(class), vec![class, module, ClassId::OBJECT]);
        assert!(registry.is_a(class, module));
    }

    #[test]
    fn test_class_method_falls_back_to_class() {
        let registry = ClassRegistry::new();
        registry.install_builtin(ClassId::CLASS, &[Builtin::new("name", stub)], false);
        let base = registry.define_class("Base", false, ClassId::OBJECT);
        let derived = registry.define_class("Derived", false, ClassId::OBJECT);
        registry.set_superclass(derived, base).unwrap();
        registry.install_builtin(base, &[Builtin::new("create", stub)], true);

        assert!(registry.lookup_class_method(derived, "create").is_some());
        assert!(registry.lookup_class_method(derived, "name").is_some());
        assert!(registry.lookup_instance_method(derived, "create").is_none());
    }

    #[test]
    fn test_constant_rebinding_rejected() {
        let registry = ClassRegistry::new();
        assert!(registry.set_constant(ClassId::OBJECT, "LIMIT", Value::int(1)));
        assert!(!registry.set_constant(ClassId::OBJECT, "LIMIT", Value::int(2)));
        assert!(registry
            .constant(ClassId::OBJECT, "LIMIT")
            .unwrap()
            .equals(&Value::int(1)));
    }

    #[test]
    fn test_constant_lookup_order() {
        let registry = ClassRegistry::new();
        let outer = registry.define_class("Outer", true, ClassId::OBJECT);
        let base = registry.define_class("Base", false, ClassId::OBJECT);
        let inner = registry.define_class("Inner", false, outer);
        registry.set_superclass(inner, base).unwrap();

        registry.set_constant(outer, "X", Value::int(1));
        registry.set_constant(base, "X", Value::int(2));
        registry.set_constant(base, "Y", Value::int(3));

        assert!(registry.lookup_constant(inner, "X").unwrap().equals(&Value::int(1)));
        assert!(registry.lookup_constant(inner, "Y").unwrap().equals(&Value::int(3)));
        assert!(registry.lookup_constant(inner, "Outer").is_some());
        assert!(registry.lookup_constant(inner, "Missing").is_none());

        assert!(registry.lookup_constant_in_namespace(outer, "Inner").is_some());
        assert!(registry.lookup_constant_in_namespace(inner, "Y").is_some());
        assert!(registry.lookup_constant_in_namespace(inner, "X").unwrap().equals(&Value::int(2)));
    }

    #[test]
    fn test_singleton_class() {
        let registry = ClassRegistry::new();
        let foo = registry.define_class("Foo", false, ClassId::OBJECT);
        let instance = InstanceObject::new(foo);

        let singleton = registry.create_singleton_class(&instance);
        assert_ne!(singleton, foo);
        assert_eq!(instance.class(), singleton);
        assert_eq!(registry.create_singleton_class(&instance), singleton);
        assert_eq!(registry.real_class(singleton), foo);
        assert!(registry.is_singleton(singleton));
    }
}
