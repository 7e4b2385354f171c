// Copyright (C) 2013-2020 Blockstack PBC, a public benefit corporation
// Copyright (C) 2020-2025 Stacks Open Internet Foundation
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

/// Implements the consensus codec for a struct by encoding/decoding each listed field in order.
#[macro_export]
macro_rules! impl_consensus_encoding {
    ($thing:ident, $($field:ident),+) => (
        impl<S: $crate::deps_common::bitcoin::network::serialize::SimpleEncoder>
            $crate::deps_common::bitcoin::network::encodable::ConsensusEncodable<S> for $thing
        {
            #[inline]
            fn consensus_encode(
                &self,
                s: &mut S,
            ) -> Result<(), $crate::deps_common::bitcoin::network::serialize::Error> {
                $(
                    $crate::deps_common::bitcoin::network::encodable::ConsensusEncodable::consensus_encode(
                        &self.$field,
                        s,
                    )?;
                )+
                Ok(())
            }
        }

        impl<D: $crate::deps_common::bitcoin::network::serialize::SimpleDecoder>
            $crate::deps_common::bitcoin::network::encodable::ConsensusDecodable<D> for $thing
        {
            #[inline]
            fn consensus_decode(
                d: &mut D,
            ) -> Result<$thing, $crate::deps_common::bitcoin::network::serialize::Error> {
                Ok($thing {
                    $(
                        $field: $crate::deps_common::bitcoin::network::encodable::ConsensusDecodable::consensus_decode(d)?,
                    )+
                })
            }
        }
    );
}

/// Fixed-length byte newtype with little-endian numeric ordering, so that sorting
/// hashes matches sorting them as 256-bit integers.
#[macro_export]
macro_rules! impl_array_newtype {
    ($thing:ident, $ty:ty, $len:expr) => {
        impl $thing {
            #[inline]
            #[allow(dead_code)]
            /// Returns the length of the object as an array
            pub fn len(&self) -> usize {
                $len
            }

            #[inline]
            #[allow(dead_code)]
            /// Returns whether the object, as an array, is empty. Always false.
            pub fn is_empty(&self) -> bool {
                false
            }

            #[inline]
            #[allow(dead_code)]
            /// Returns the underlying bytes.
            pub fn as_bytes(&self) -> &[$ty; $len] {
                &self.0
            }

            #[inline]
            #[allow(dead_code)]
            /// Returns the underlying bytes.
            pub fn into_bytes(self) -> [$ty; $len] {
                self.0
            }
        }

        impl ::std::ops::Index<usize> for $thing {
            type Output = $ty;

            #[inline]
            fn index(&self, index: usize) -> &$ty {
                &self.0[index]
            }
        }

        impl ::std::ops::Index<::std::ops::RangeFull> for $thing {
            type Output = [$ty];

            #[inline]
            fn index(&self, _: ::std::ops::RangeFull) -> &[$ty] {
                &self.0[..]
            }
        }

        impl PartialEq for $thing {
            #[inline]
            fn eq(&self, other: &$thing) -> bool {
                self.0[..] == other.0[..]
            }
        }

        impl Eq for $thing {}

        impl PartialOrd for $thing {
            #[inline]
            fn partial_cmp(&self, other: &$thing) -> Option<::std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $thing {
            #[inline]
            fn cmp(&self, other: &$thing) -> ::std::cmp::Ordering {
                // most significant byte is last
                for i in (0..$len).rev() {
                    match self.0[i].cmp(&other.0[i]) {
                        ::std::cmp::Ordering::Equal => continue,
                        ord => return ord,
                    }
                }
                ::std::cmp::Ordering::Equal
            }
        }

        impl Clone for $thing {
            #[inline]
            fn clone(&self) -> $thing {
                *self
            }
        }

        impl Copy for $thing {}

        impl ::std::hash::Hash for $thing {
            #[inline]
            fn hash<H: ::std::hash::Hasher>(&self, state: &mut H) {
                self.0.hash(state)
            }
        }
    };
}
