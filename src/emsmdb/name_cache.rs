//-
// Copyright (c) 2024, Jason Lingle
//
// This file is part of Mapicore.
//
// Mapicore is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mapicore is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Mapicore. If not, see <http://www.gnu.org/licenses/>.

//! Per-logon mapping between named-property ids and names.
//!
//! Entries are only ever added. Once an id and name are paired they stay
//! paired for the life of the logon.

use std::collections::HashMap;

use log::debug;

use crate::mapi::model::*;
use crate::store::StoreClient;
use crate::support::error::Error;

#[derive(Debug, Default)]
pub struct NameCache {
    id_to_name: HashMap<u16, PropertyName>,
    name_to_id: HashMap<String, u16>,
}

/// Where each requested item's answer comes from in a batched lookup.
enum Slot<T> {
    Known(T),
    /// Index into the batch sent to the store.
    Fetched(usize),
}

fn well_known_name(id: u16) -> PropertyName {
    PropertyName::lid(PS_MAPI, u32::from(id))
}

/// Names in the MAPI namespace map straight onto fixed ids.
fn well_known_id(name: &PropertyName) -> Option<u16> {
    if PS_MAPI != name.guid {
        return None;
    }

    Some(match name.kind {
        NameKind::Lid(lid) => lid as u16,
        _ => 0,
    })
}

fn cacheable(name: &PropertyName) -> bool {
    match name.kind {
        NameKind::Lid(..) | NameKind::Name(..) => true,
        NameKind::Unknown(..) => false,
    }
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.id_to_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_name.is_empty()
    }

    fn insert(&mut self, id: u16, name: &PropertyName) {
        if 0 == id {
            return;
        }

        let key = match name.packed_key() {
            Some(key) => key,
            None => return,
        };
        self.id_to_name.entry(id).or_insert_with(|| name.clone());
        self.name_to_id.entry(key).or_insert(id);
    }

    pub fn get_named_propname(
        &mut self,
        store: &dyn StoreClient,
        id: u16,
    ) -> Result<Option<PropertyName>, Error> {
        Ok(self.get_named_propnames(store, &[id])?.pop().flatten())
    }

    /// Map each of `ids` to its name, making at most one store call for the
    /// ids that are neither well-known nor cached.
    pub fn get_named_propnames(
        &mut self,
        store: &dyn StoreClient,
        ids: &[u16],
    ) -> Result<Vec<Option<PropertyName>>, Error> {
        let mut slots = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for &id in ids {
            if id < PropTag::NAMED_BASE {
                slots.push(Slot::Known(Some(well_known_name(id))));
            } else if let Some(name) = self.id_to_name.get(&id) {
                slots.push(Slot::Known(Some(name.clone())));
            } else {
                slots.push(Slot::Fetched(missing.len()));
                missing.push(id);
            }
        }

        let mut fetched = if missing.is_empty() {
            Vec::new()
        } else {
            debug!("Resolving {} property ids from store", missing.len());
            store.get_named_propnames(&missing)?
        };
        if fetched.len() != missing.len() {
            return Err(Error::Store(format!(
                "asked for {} property names, got {}",
                missing.len(),
                fetched.len()
            )));
        }

        for (&id, name) in missing.iter().zip(&fetched) {
            if let Some(name) = name.as_ref().filter(|n| cacheable(n)) {
                self.insert(id, name);
            }
        }

        Ok(slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Known(name) => name,
                Slot::Fetched(ix) => fetched[ix].take(),
            })
            .collect())
    }

    pub fn get_named_propid(
        &mut self,
        store: &dyn StoreClient,
        create: bool,
        name: &PropertyName,
    ) -> Result<u16, Error> {
        Ok(self
            .get_named_propids(store, create, std::slice::from_ref(name))?
            .pop()
            .unwrap_or(0))
    }

    /// Map each of `names` to its id, making at most one store call for the
    /// names that are neither well-known nor cached.
    ///
    /// An id of 0 means the name has no id (and `create` was false, or the
    /// name cannot be represented). Such results are not cached.
    pub fn get_named_propids(
        &mut self,
        store: &dyn StoreClient,
        create: bool,
        names: &[PropertyName],
    ) -> Result<Vec<u16>, Error> {
        let mut slots = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            if let Some(id) = well_known_id(name) {
                slots.push(Slot::Known(id));
                continue;
            }

            let key = match name.packed_key() {
                Some(key) => key,
                None => {
                    slots.push(Slot::Known(0));
                    continue;
                }
            };

            match self.name_to_id.get(&key) {
                Some(&id) => slots.push(Slot::Known(id)),
                None => {
                    slots.push(Slot::Fetched(missing.len()));
                    missing.push(name.clone());
                }
            }
        }

        let fetched = if missing.is_empty() {
            Vec::new()
        } else {
            debug!("Resolving {} property names from store", missing.len());
            store.get_named_propids(create, &missing)?
        };
        if fetched.len() != missing.len() {
            return Err(Error::Store(format!(
                "asked for {} property ids, got {}",
                missing.len(),
                fetched.len()
            )));
        }

        for (name, &id) in missing.iter().zip(&fetched) {
            self.insert(id, name);
        }

        Ok(slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Known(id) => id,
                Slot::Fetched(ix) => fetched[ix],
            })
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn keywords() -> PropertyName {
        PropertyName::name(PS_PUBLIC_STRINGS, "Keywords")
    }

    #[test]
    fn resolution_is_cached() {
        let store = MemoryStore::new();
        let mut cache = NameCache::new();

        let id = cache.get_named_propid(&store, true, &keywords()).unwrap();
        assert!(id >= PropTag::NAMED_BASE);
        assert_eq!(1, store.count("get_named_propids"));

        let again = cache
            .get_named_propid(
                &store,
                false,
                &PropertyName::name(PS_PUBLIC_STRINGS, "KEYWORDS"),
            )
            .unwrap();
        assert_eq!(id, again);
        assert_eq!(1, store.count("get_named_propids"));

        assert_eq!(
            Some(keywords()),
            cache.get_named_propname(&store, id).unwrap()
        );
        assert_eq!(0, store.count("get_named_propnames"));
    }

    #[test]
    fn zero_is_not_cached() {
        let store = MemoryStore::new();
        let mut cache = NameCache::new();
        let name = PropertyName::lid(PSETID_TASK, 0x8101);

        assert_eq!(0, cache.get_named_propid(&store, false, &name).unwrap());
        assert_eq!(0, cache.get_named_propid(&store, false, &name).unwrap());
        assert_eq!(2, store.count("get_named_propids"));
        assert!(cache.is_empty());

        let id = cache.get_named_propid(&store, true, &name).unwrap();
        assert_ne!(0, id);
        assert_eq!(1, cache.len());
    }

    #[test]
    fn well_known_and_unknown_kinds_skip_the_store() {
        let store = MemoryStore::new();
        let mut cache = NameCache::new();

        assert_eq!(
            0x3001,
            cache
                .get_named_propid(
                    &store,
                    true,
                    &PropertyName::lid(PS_MAPI, 0x3001)
                )
                .unwrap()
        );
        assert_eq!(
            0,
            cache
                .get_named_propid(
                    &store,
                    true,
                    &PropertyName::name(PS_MAPI, "x")
                )
                .unwrap()
        );
        assert_eq!(
            0,
            cache
                .get_named_propid(
                    &store,
                    true,
                    &PropertyName {
                        guid: PSETID_COMMON,
                        kind: NameKind::Unknown(9),
                    }
                )
                .unwrap()
        );
        assert_eq!(
            Some(PropertyName::lid(PS_MAPI, 0x0037)),
            cache.get_named_propname(&store, 0x0037).unwrap()
        );
        assert!(store.calls().is_empty());
    }

    #[test]
    fn batches_make_one_round_trip() {
        let store = MemoryStore::new();
        let mut cache = NameCache::new();
        let names = vec![
            keywords(),
            PropertyName::lid(PS_MAPI, 0x0E07),
            PropertyName::lid(PSETID_APPOINTMENT, 0x8205),
            PropertyName::lid(PSETID_COMMON, 0x8503),
        ];

        let first = cache.get_named_propid(&store, true, &names[0]).unwrap();
        store.clear_calls();

        let ids = cache.get_named_propids(&store, true, &names).unwrap();
        assert_eq!(vec!["get_named_propids"], store.calls());
        assert_eq!(first, ids[0]);
        assert_eq!(0x0E07, ids[1]);
        assert!(ids[2] >= PropTag::NAMED_BASE);
        assert!(ids[3] >= PropTag::NAMED_BASE);
        assert_ne!(ids[2], ids[3]);

        store.clear_calls();
        let mut fresh = NameCache::new();
        let back = fresh
            .get_named_propnames(&store, &[ids[3], 0x0E07, ids[2], 0xFFFE])
            .unwrap();
        assert_eq!(vec!["get_named_propnames"], store.calls());
        assert_eq!(Some(names[3].clone()), back[0]);
        assert_eq!(Some(PropertyName::lid(PS_MAPI, 0x0E07)), back[1]);
        assert_eq!(Some(names[2].clone()), back[2]);
        assert_eq!(None, back[3]);

        assert_eq!(
            ids[2],
            fresh.get_named_propid(&store, false, &names[2]).unwrap()
        );
        assert_eq!(1, store.count("get_named_propnames"));
        assert_eq!(0, store.count("get_named_propids"));
    }

    #[test]
    fn store_failure_keeps_earlier_entries() {
        let store = MemoryStore::new();
        let mut cache = NameCache::new();
        let id = cache.get_named_propid(&store, true, &keywords()).unwrap();

        store.fail_on("get_named_propids");
        assert_matches!(
            Err(Error::Store(..)),
            cache.get_named_propids(
                &store,
                true,
                &[keywords(), PropertyName::lid(PSETID_TASK, 1)]
            )
        );
        assert_eq!(
            id,
            cache.get_named_propid(&store, false, &keywords()).unwrap()
        );
    }
}
