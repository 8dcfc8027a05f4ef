use crate::arena::Arena;
use crate::id::{MatchSpecId, NameId, SolvableId, StringId};
use crate::solvable::{PackageSolvable, Solvable, SolvableRecord};
use rattler_conda_types::{
    GenericVirtualPackage, MatchSpec, ParseMatchSpecError, ParseStrictness, RepoDataRecord,
};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

/// A pool stores all the information the solver needs: the package names, the match specs and
/// the solvables, each interned so that the solver can refer to them by id.
///
/// Candidates are kept per package name in the order in which they should be tried. That order
/// is decided by the user of the pool, see [`Pool::sort_candidates`].
pub struct Pool<'a> {
    solvables: Arena<SolvableId, Solvable<'a>>,

    package_names: Arena<NameId, String>,
    names_to_ids: HashMap<String, NameId>,
    packages_by_name: Vec<Vec<SolvableId>>,

    match_specs: Arena<MatchSpecId, MatchSpec>,
    match_spec_names: Vec<NameId>,
    match_specs_to_ids: HashMap<String, MatchSpecId>,

    strings: Arena<StringId, String>,
    strings_to_ids: HashMap<String, StringId>,

    match_spec_to_candidates: RefCell<HashMap<MatchSpecId, Rc<[SolvableId]>>>,
    match_spec_to_forbidden: RefCell<HashMap<MatchSpecId, Rc<[SolvableId]>>>,
}

impl Default for Pool<'_> {
    fn default() -> Self {
        let mut solvables = Arena::new();
        solvables.alloc(Solvable::Root);

        Self {
            solvables,
            package_names: Arena::new(),
            names_to_ids: HashMap::new(),
            packages_by_name: Vec::new(),
            match_specs: Arena::new(),
            match_spec_names: Vec::new(),
            match_specs_to_ids: HashMap::new(),
            strings: Arena::new(),
            strings_to_ids: HashMap::new(),
            match_spec_to_candidates: RefCell::default(),
            match_spec_to_forbidden: RefCell::default(),
        }
    }
}

impl<'a> Pool<'a> {
    /// Creates a pool that only contains the root solvable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a package name, returning the id of an existing entry if the name was seen before.
    pub fn intern_package_name(&mut self, name: &str) -> NameId {
        if let Some(&id) = self.names_to_ids.get(name) {
            return id;
        }
        let id = self.package_names.alloc(name.to_owned());
        self.names_to_ids.insert(name.to_owned(), id);
        self.packages_by_name.push(Vec::new());
        id
    }

    /// Returns the id of a package name if it has been interned.
    pub fn lookup_package_name(&self, name: &str) -> Option<NameId> {
        self.names_to_ids.get(name).copied()
    }

    /// Interns an arbitrary string, used to describe why a solvable was excluded.
    pub fn intern_string(&mut self, value: impl Into<String>) -> StringId {
        let value = value.into();
        if let Some(&id) = self.strings_to_ids.get(&value) {
            return id;
        }
        let id = self.strings.alloc(value.clone());
        self.strings_to_ids.insert(value, id);
        id
    }

    /// Parses and interns a match spec as it appears in the dependencies of a record. Identical
    /// strings share a single id.
    pub fn intern_matchspec(&mut self, spec: &str) -> Result<MatchSpecId, ParseMatchSpecError> {
        if let Some(&id) = self.match_specs_to_ids.get(spec) {
            return Ok(id);
        }
        let parsed = MatchSpec::from_str(spec, ParseStrictness::Lenient)?;
        let id = self.add_match_spec(parsed);
        self.match_specs_to_ids.insert(spec.to_owned(), id);
        Ok(id)
    }

    /// Adds an already parsed match spec. Every call returns a new id, which allows callers to
    /// tell apart identical specs that were requested for different reasons.
    pub fn add_match_spec(&mut self, spec: MatchSpec) -> MatchSpecId {
        let name = self.intern_package_name(spec.name.as_normalized());
        self.match_spec_names.push(name);
        self.match_specs.alloc(spec)
    }

    /// Adds a package from a channel to the pool. Fails if one of its dependencies or
    /// constraints cannot be parsed.
    pub fn add_package(
        &mut self,
        record: &'a RepoDataRecord,
    ) -> Result<SolvableId, ParseMatchSpecError> {
        let package_record = &record.package_record;
        let dependencies = package_record
            .depends
            .iter()
            .map(|spec| self.intern_matchspec(spec))
            .collect::<Result<Vec<_>, _>>()?;
        let constrains = package_record
            .constrains
            .iter()
            .map(|spec| self.intern_matchspec(spec))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.add_solvable(SolvableRecord::Package(record), dependencies, constrains))
    }

    /// Adds a virtual package to the pool. Virtual packages have no dependencies.
    pub fn add_virtual_package(&mut self, package: &'a GenericVirtualPackage) -> SolvableId {
        self.add_solvable(SolvableRecord::Virtual(package), Vec::new(), Vec::new())
    }

    fn add_solvable(
        &mut self,
        record: SolvableRecord<'a>,
        dependencies: Vec<MatchSpecId>,
        constrains: Vec<MatchSpecId>,
    ) -> SolvableId {
        let name = self.intern_package_name(record.name());
        let id = self.solvables.alloc(Solvable::Package(PackageSolvable {
            name,
            record,
            dependencies,
            constrains,
        }));
        self.packages_by_name[name.index()].push(id);
        id
    }

    /// Reorders the candidates of every package name. The solver tries candidates of a name in
    /// this order, the first one being the most preferred.
    pub fn sort_candidates(&mut self, mut compare: impl FnMut(SolvableId, SolvableId) -> Ordering) {
        for candidates in &mut self.packages_by_name {
            candidates.sort_by(|&a, &b| compare(a, b));
        }
        self.match_spec_to_candidates.borrow_mut().clear();
        self.match_spec_to_forbidden.borrow_mut().clear();
    }

    /// Returns the solvable with the given id.
    pub fn resolve_solvable(&self, id: SolvableId) -> &Solvable<'a> {
        &self.solvables[id]
    }

    /// Returns the package solvable with the given id, `None` for the root.
    pub fn resolve_package(&self, id: SolvableId) -> Option<&PackageSolvable<'a>> {
        self.solvables[id].package()
    }

    /// Returns the package name with the given id.
    pub fn resolve_package_name(&self, id: NameId) -> &str {
        &self.package_names[id]
    }

    /// Returns the match spec with the given id.
    pub fn resolve_match_spec(&self, id: MatchSpecId) -> &MatchSpec {
        &self.match_specs[id]
    }

    /// Returns the string with the given id.
    pub fn resolve_string(&self, id: StringId) -> &str {
        &self.strings[id]
    }

    /// Returns the name a match spec selects.
    pub fn match_spec_name(&self, id: MatchSpecId) -> NameId {
        self.match_spec_names[id.index()]
    }

    /// All the solvables with the given name, in candidate order.
    pub fn packages_by_name(&self, name: NameId) -> &[SolvableId] {
        &self.packages_by_name[name.index()]
    }

    /// The total number of solvables including the root.
    pub fn solvable_count(&self) -> usize {
        self.solvables.len()
    }

    /// Iterates over all the package solvables in the pool.
    pub fn packages(&self) -> impl Iterator<Item = (SolvableId, &PackageSolvable<'a>)> {
        self.solvables
            .iter()
            .filter_map(|(id, solvable)| solvable.package().map(|package| (id, package)))
    }

    /// Returns the solvables that match the spec, in candidate order.
    pub(crate) fn candidates(&self, spec_id: MatchSpecId) -> Rc<[SolvableId]> {
        self.cached_filter(&self.match_spec_to_candidates, spec_id, true)
    }

    /// Returns the solvables that have the name of the spec but do not match it. These are the
    /// solvables that a constraint forbids.
    pub(crate) fn forbidden(&self, spec_id: MatchSpecId) -> Rc<[SolvableId]> {
        self.cached_filter(&self.match_spec_to_forbidden, spec_id, false)
    }

    fn cached_filter(
        &self,
        cache: &RefCell<HashMap<MatchSpecId, Rc<[SolvableId]>>>,
        spec_id: MatchSpecId,
        matching: bool,
    ) -> Rc<[SolvableId]> {
        if let Some(solvables) = cache.borrow().get(&spec_id) {
            return solvables.clone();
        }
        let spec = &self.match_specs[spec_id];
        let solvables: Rc<[SolvableId]> = self
            .packages_by_name(self.match_spec_name(spec_id))
            .iter()
            .copied()
            .filter(|&id| self.record_matches(id, spec) == matching)
            .collect();
        cache.borrow_mut().insert(spec_id, solvables.clone());
        solvables
    }

    fn record_matches(&self, id: SolvableId, spec: &MatchSpec) -> bool {
        self.resolve_package(id)
            .is_some_and(|package| package.record.matches(spec))
    }

    /// A human readable representation of a solvable.
    pub fn solvable_display(&self, id: SolvableId) -> String {
        match self.resolve_package(id) {
            None => "<root>".to_owned(),
            Some(package) => package.record.to_string(),
        }
    }
}
