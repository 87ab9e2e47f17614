use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::path;

/// A declared dependency in any of the supported shapes.
///
/// - a bare search (`"earth"`, `"/countries/earth"`): the accessor is the last segment
/// - an explicit `(accessor, search)` pair
/// - a map of accessor to search
/// - a list of any of the above
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyDecl {
  Search(String),
  Pair { accessor: String, search: String },
  Many(Vec<DependencyDecl>),
}

impl From<&str> for DependencyDecl {
  fn from(search: &str) -> Self {
    DependencyDecl::Search(search.to_string())
  }
}

impl From<String> for DependencyDecl {
  fn from(search: String) -> Self {
    DependencyDecl::Search(search)
  }
}

impl From<(&str, &str)> for DependencyDecl {
  fn from((accessor, search): (&str, &str)) -> Self {
    DependencyDecl::Pair {
      accessor: accessor.to_string(),
      search: search.to_string(),
    }
  }
}

impl From<(String, String)> for DependencyDecl {
  fn from((accessor, search): (String, String)) -> Self {
    DependencyDecl::Pair { accessor, search }
  }
}

impl<T: Into<DependencyDecl>> From<Vec<T>> for DependencyDecl {
  fn from(items: Vec<T>) -> Self {
    DependencyDecl::Many(items.into_iter().map(Into::into).collect())
  }
}

impl From<BTreeMap<String, String>> for DependencyDecl {
  fn from(map: BTreeMap<String, String>) -> Self {
    DependencyDecl::Many(map.into_iter().map(DependencyDecl::from).collect())
  }
}

impl From<HashMap<String, String>> for DependencyDecl {
  fn from(map: HashMap<String, String>) -> Self {
    DependencyDecl::Many(map.into_iter().map(DependencyDecl::from).collect())
  }
}

/// A normalized dependency: the local accessor name and the search resolved
/// against the owning namespace when the dependency is accessed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
  accessor: String,
  search: String,
}

impl Dependency {
  pub fn new(accessor: impl AsRef<str>, search: impl Into<String>) -> Result<Self> {
    let search = search.into();
    let accessor = path::segments(accessor.as_ref()).last().unwrap_or_default().to_string();

    if search.trim().is_empty() {
      return Err(Error::InvalidArgument("a dependency search must not be blank".to_string()));
    }
    if accessor.is_empty() {
      return Err(Error::InvalidArgument(format!(
        "dependency `{search}` does not provide an accessor name"
      )));
    }

    Ok(Self { accessor, search })
  }

  /// Flatten a declaration into normalized dependencies.
  pub fn resolve(decl: &DependencyDecl) -> Result<Vec<Dependency>> {
    let mut out = Vec::new();
    Self::collect(decl, &mut out)?;
    Ok(out)
  }

  fn collect(decl: &DependencyDecl, out: &mut Vec<Dependency>) -> Result<()> {
    match decl {
      DependencyDecl::Search(search) => out.push(Dependency::new(search, search.clone())?),
      DependencyDecl::Pair { accessor, search } => out.push(Dependency::new(accessor, search.clone())?),
      DependencyDecl::Many(items) => {
        for item in items {
          Self::collect(item, out)?;
        }
      }
    }
    Ok(())
  }

  pub fn accessor(&self) -> &str {
    &self.accessor
  }

  pub fn search(&self) -> &str {
    &self.search
  }
}
