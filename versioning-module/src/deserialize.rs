// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Deserialization helpers for the versioning configuration

use log::trace;
use serde::de::value::{MapAccessDeserializer, StrDeserializer, StringDeserializer};
use serde::de::{DeserializeOwned, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt::Debug;
use std::fs::File;
use std::io::BufReader;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use crate::Error;

/// Trait for configuration structures that can be loaded from YAML data. This trait has a blanket
/// implementation for any structure implementing [`serde::Deserialize`].
pub trait FromYaml {
    /// Loads configuration from a YAML file.
    fn load_from_yaml<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
        Self: Sized;

    /// Loads configuration from a YAML string.
    fn from_yaml<S>(yaml: S) -> Result<Self, Error>
    where
        S: AsRef<str>,
        Self: Sized;
}

impl<D> FromYaml for D
where
    D: DeserializeOwned + Debug,
{
    fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path.as_ref()).map_err(|err| Error::ConfigFile {
            path: path.as_ref().to_owned(),
            source: err,
        })?;
        let reader = BufReader::new(file);

        let conf = serde_yaml::from_reader(reader)?;
        trace!("Loaded configuration file: {conf:#?}");

        Ok(conf)
    }

    fn from_yaml<S: AsRef<str>>(yaml: S) -> Result<Self, Error> {
        let conf = serde_yaml::from_str(yaml.as_ref())?;
        trace!("Loaded configuration: {conf:#?}");

        Ok(conf)
    }
}

/// A wrapper around the `Vec` type allowing more comfortable deserialization.
///
/// If a list is encountered in the configuration file, it is deserialized into `Vec` directly.
/// String or map values are deserialized as a `Vec` instance with one element instead. `null`
/// results in an empty list.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OneOrMany<T> {
    inner: Vec<T>,
}

impl<T> OneOrMany<T> {
    /// Unwraps the inner `Vec` type
    pub fn into_inner(self) -> Vec<T> {
        self.inner
    }
}

impl<T> Debug for OneOrMany<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

// Deriving `Default` would unnecessarily require `T` to implement `Default`
impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self {
            inner: Default::default(),
        }
    }
}

impl<T> Deref for OneOrMany<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> DerefMut for OneOrMany<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(value: Vec<T>) -> Self {
        Self { inner: value }
    }
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        value.inner
    }
}

impl<'a, T> IntoIterator for &'a OneOrMany<T> {
    type Item = <&'a Vec<T> as IntoIterator>::Item;
    type IntoIter = <&'a Vec<T> as IntoIterator>::IntoIter;
    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl<T> IntoIterator for OneOrMany<T> {
    type Item = <Vec<T> as IntoIterator>::Item;
    type IntoIter = <Vec<T> as IntoIterator>::IntoIter;
    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<'de, T> Deserialize<'de> for OneOrMany<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ListVisitor<T> {
            marker: PhantomData<T>,
        }

        impl<'de, T: Deserialize<'de>> Visitor<'de> for ListVisitor<T> {
            type Value = OneOrMany<T>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("T or Vec<T>")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut list = OneOrMany::default();
                while let Some(entry) = seq.next_element()? {
                    list.push(entry);
                }
                Ok(list)
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(OneOrMany::default())
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(vec![T::deserialize(StringDeserializer::new(v))?].into())
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(vec![T::deserialize(StrDeserializer::new(v))?].into())
            }

            fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                Ok(vec![T::deserialize(MapAccessDeserializer::new(map))?].into())
            }
        }

        deserializer.deserialize_any(ListVisitor {
            marker: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
    #[serde(default)]
    struct Conf {
        value: OneOrMany<String>,
    }

    #[test]
    fn one_or_many_strings() {
        let conf = Conf::from_yaml("value: hi").unwrap();
        assert_eq!(&*conf.value, &vec!["hi".to_owned()]);

        let conf = Conf::from_yaml("value: [hi, another]").unwrap();
        assert_eq!(&*conf.value, &vec!["hi".to_owned(), "another".to_owned()]);

        let conf = Conf::from_yaml("value: ~").unwrap();
        assert!(conf.value.is_empty());

        let conf = Conf::from_yaml("{}").unwrap();
        assert!(conf.value.is_empty());
    }

    #[test]
    fn missing_file() {
        let err = Conf::load_from_yaml("/nonexistent/versioning.yaml").unwrap_err();
        assert!(matches!(err, Error::ConfigFile { .. }));
    }
}
