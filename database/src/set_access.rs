use crate::{db::DB, errors::StoreError};

use super::prelude::{DbKey, DbWriter};
use rocksdb::{IteratorMode, ReadOptions};
use serde::{Serialize, de::DeserializeOwned};
use std::{marker::PhantomData, sync::Arc};

/// A concurrent DB store for typed **set** access *without* caching.
///
/// Every member of the set stored under `key` becomes its own DB entry `prefix/key/member` with an empty value,
/// so adding a member is a blind write and re-adding an existing member is a no-op.
#[derive(Clone)]
pub struct DbSetAccess<TKey, TData>
where
    TKey: Copy + Send + Sync,
    TData: Clone + Send + Sync,
{
    db: Arc<DB>,

    // DB bucket/path
    prefix: Vec<u8>,

    _phantom: PhantomData<(TKey, TData)>,
}

impl<TKey, TData> DbSetAccess<TKey, TData>
where
    TKey: Copy + Send + Sync + AsRef<[u8]>,
    TData: Clone + Send + Sync + DeserializeOwned + Serialize,
{
    pub fn new(db: Arc<DB>, prefix: Vec<u8>) -> Self {
        Self { db, prefix, _phantom: Default::default() }
    }

    pub fn write(&self, mut writer: impl DbWriter, key: TKey, data: &TData) -> Result<(), StoreError> {
        writer.put(self.get_db_key(key, data)?, [])?;
        Ok(())
    }

    pub fn write_many<'a>(&self, mut writer: impl DbWriter, key: TKey, iter: impl Iterator<Item = &'a TData>) -> Result<(), StoreError>
    where
        TData: 'a,
    {
        for data in iter {
            writer.put(self.get_db_key(key, data)?, [])?;
        }
        Ok(())
    }

    fn get_db_key(&self, key: TKey, data: &TData) -> Result<DbKey, StoreError> {
        let bin_data = bincode::serialize(data)?;
        Ok(DbKey::new_with_bucket(&self.prefix, key, bin_data))
    }

    pub fn bucket_iterator(&self, key: TKey) -> impl Iterator<Item = Result<TData, StoreError>> + '_ {
        let db_key = DbKey::new_with_bucket(&self.prefix, key, []);
        let mut read_opts = ReadOptions::default();
        read_opts.set_iterate_range(rocksdb::PrefixRange(db_key.as_ref()));

        self.db.iterator_opt(IteratorMode::Start, read_opts).map(move |item| match item {
            Ok((key_bytes, _)) => Ok(bincode::deserialize(&key_bytes[db_key.prefix_len()..])?),
            Err(err) => Err(err.into()),
        })
    }
}
