//! host patterns
//!
//! A pattern is a list of terms separated by `:` or `,`:
//! - `all` or `*` matches every host
//! - a group name matches every host in that group (directly or through child groups)
//! - a host name matches that host
//!
//! Terms prefixed with `&` intersect, terms prefixed with `!` exclude. Plain terms are united first, then
//! intersections apply, then exclusions. A pattern made only of `&`/`!` terms starts from `all`.
//!
//! `web:&prod:!web3` selects hosts in `web` that are also in `prod`, except `web3`.
use super::{HostId, Inventory, ALL};

#[derive(Debug, PartialEq, Eq)]
pub enum Term<'p> {
    Include(&'p str),
    Intersect(&'p str),
    Exclude(&'p str),
}

#[derive(Debug, PartialEq, Eq)]
pub struct HostPattern<'p> {
    terms: Vec<Term<'p>>,
}

impl<'p> HostPattern<'p> {
    pub fn parse(pattern: &'p str) -> Self {
        let terms = pattern
            .split([':', ','])
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| {
                if let Some(name) = term.strip_prefix('!') {
                    Term::Exclude(name)
                } else if let Some(name) = term.strip_prefix('&') {
                    Term::Intersect(name)
                } else {
                    Term::Include(term)
                }
            })
            .collect();

        Self { terms }
    }

    /// Matching hosts in declaration order, without duplicates
    #[tracing::instrument(level = "trace", skip(inventory))]
    pub fn select(&self, inventory: &Inventory) -> Vec<HostId> {
        let mut selected = vec![false; inventory.host_count()];

        let has_include = self.terms.iter().any(|t| matches!(t, Term::Include(_)));
        if !has_include {
            mark(&mut selected, &matching(inventory, ALL), true);
        }

        for term in &self.terms {
            if let Term::Include(name) = term {
                mark(&mut selected, &matching(inventory, name), true);
            }
        }

        for term in &self.terms {
            if let Term::Intersect(name) = term {
                let mut keep = vec![false; selected.len()];
                mark(&mut keep, &matching(inventory, name), true);
                for (flag, keep) in selected.iter_mut().zip(keep) {
                    *flag &= keep;
                }
            }
        }

        for term in &self.terms {
            if let Term::Exclude(name) = term {
                mark(&mut selected, &matching(inventory, name), false);
            }
        }

        inventory
            .host_ids()
            .filter(|host| selected[host.index()])
            .collect()
    }
}

fn mark(selected: &mut [bool], hosts: &[HostId], value: bool) {
    for host in hosts {
        selected[host.index()] = value;
    }
}

/// Hosts matched by a single term
fn matching(inventory: &Inventory, name: &str) -> Vec<HostId> {
    if name == ALL || name == "*" {
        return inventory.host_ids().collect();
    }

    if let Some(group) = inventory.group_id(name) {
        return inventory.hosts_in_group(group);
    }

    if let Some(host) = inventory.host_id(name) {
        return vec![host];
    }

    tracing::warn!(term = name, "pattern does not match any group or host");
    vec![]
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::inventory;
    use pretty_assertions::assert_eq;

    fn selected(inventory: &Inventory, pattern: &str) -> Vec<String> {
        inventory
            .get_hosts(pattern)
            .into_iter()
            .map(|id| inventory.host(id).name.clone())
            .collect()
    }

    fn fixture() -> Inventory {
        inventory! {r#"
        all:
          hosts:
            bastion:
          children:
            web:
              hosts:
                web1:
                web2:
                web3:
            db:
              hosts:
                db1:
            prod:
              hosts:
                web1:
                db1:
        "#}
    }

    #[test]
    fn parse_terms() {
        assert_eq!(
            HostPattern::parse("web, &prod:!web3").terms,
            vec![
                Term::Include("web"),
                Term::Intersect("prod"),
                Term::Exclude("web3")
            ]
        );
    }

    #[test]
    fn all_hosts_in_declaration_order() {
        let inventory = fixture();
        assert_eq!(
            selected(&inventory, "all"),
            vec!["bastion", "web1", "web2", "web3", "db1"]
        );
        assert_eq!(selected(&inventory, "*"), selected(&inventory, "all"));
    }

    #[test]
    fn union_keeps_declaration_order() {
        let inventory = fixture();
        assert_eq!(selected(&inventory, "db:web1"), vec!["web1", "db1"]);
    }

    #[test]
    fn intersection_and_exclusion() {
        let inventory = fixture();
        assert_eq!(selected(&inventory, "web:&prod"), vec!["web1"]);
        assert_eq!(selected(&inventory, "web:!web2"), vec!["web1", "web3"]);
        assert_eq!(selected(&inventory, "!web"), vec!["bastion", "db1"]);
    }

    #[test]
    fn ungrouped_and_unknown() {
        let inventory = fixture();
        assert_eq!(selected(&inventory, "ungrouped"), vec!["bastion"]);
        assert!(selected(&inventory, "nope").is_empty());
    }
}
