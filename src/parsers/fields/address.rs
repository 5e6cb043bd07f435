/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use crate::Address;

#[derive(Clone, Copy, PartialEq, Eq)]
enum AddressState {
    Text,
    Quoted,
    Escaped,
    Angle,
    Comment(u32),
}

/// A run of mailboxes from an address list: either an RFC 5322 group
/// (`name: members;`) or, when `name` is `None`, ungrouped mailboxes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressGroup {
    pub name: Option<String>,
    pub addresses: Vec<Address>,
}

/// Splits an address list into mailboxes. Display names are returned raw,
/// still carrying any encoded words. Group names are dropped and their
/// members flattened into the list.
pub fn parse_address_list(value: &str) -> Vec<Address> {
    parse_address_groups(value)
        .into_iter()
        .flat_map(|group| group.addresses)
        .collect()
}

/// Splits an address list into groups, keeping group names raw. Runs of
/// mailboxes outside any group are returned as unnamed groups.
pub fn parse_address_groups(value: &str) -> Vec<AddressGroup> {
    let mut groups = Vec::new();
    let mut current = AddressGroup {
        name: None,
        addresses: Vec::new(),
    };
    let mut state = AddressState::Text;
    let mut start = 0;

    for (pos, ch) in value.char_indices() {
        state = match (state, ch) {
            (AddressState::Text, '"') => AddressState::Quoted,
            (AddressState::Text, '<') => AddressState::Angle,
            (AddressState::Text, '(') => AddressState::Comment(1),
            (AddressState::Text, ',') => {
                push_mailbox(&mut current.addresses, &value[start..pos]);
                start = pos + 1;
                AddressState::Text
            }
            (AddressState::Text, ';') => {
                push_mailbox(&mut current.addresses, &value[start..pos]);
                start = pos + 1;
                if current.name.is_some() {
                    groups.push(std::mem::replace(
                        &mut current,
                        AddressGroup {
                            name: None,
                            addresses: Vec::new(),
                        },
                    ));
                }
                AddressState::Text
            }
            (AddressState::Text, ':') => {
                if current.name.is_some() || !current.addresses.is_empty() {
                    groups.push(std::mem::replace(
                        &mut current,
                        AddressGroup {
                            name: None,
                            addresses: Vec::new(),
                        },
                    ));
                }
                current.name = Some(unquote(value[start..pos].trim()));
                start = pos + 1;
                AddressState::Text
            }
            (AddressState::Quoted, '\\') => AddressState::Escaped,
            (AddressState::Escaped, _) => AddressState::Quoted,
            (AddressState::Quoted, '"') => AddressState::Text,
            (AddressState::Angle, '>') => AddressState::Text,
            (AddressState::Comment(depth), '(') => AddressState::Comment(depth + 1),
            (AddressState::Comment(1), ')') => AddressState::Text,
            (AddressState::Comment(depth), ')') => AddressState::Comment(depth - 1),
            (state, _) => state,
        };
    }
    push_mailbox(&mut current.addresses, &value[start..]);
    if current.name.is_some() || !current.addresses.is_empty() {
        groups.push(current);
    }

    groups
}

fn push_mailbox(addresses: &mut Vec<Address>, mailbox: &str) {
    let mailbox = mailbox.trim();
    if mailbox.is_empty() {
        return;
    }

    if let (Some(open), Some(close)) = (mailbox.rfind('<'), mailbox.rfind('>')) {
        if open < close {
            let name = unquote(mailbox[..open].trim());
            addresses.push(Address {
                name: (!name.is_empty()).then_some(name),
                address: mailbox[open + 1..close].trim().to_string(),
            });
            return;
        }
    }

    // addr-spec followed by an optional comment holding the name
    let (address, comment) = match mailbox.find('(') {
        Some(open) => (
            mailbox[..open].trim(),
            mailbox[open + 1..].trim_end().strip_suffix(')').map(str::trim),
        ),
        None => (mailbox, None),
    };
    addresses.push(Address {
        name: comment.filter(|c| !c.is_empty()).map(str::to_string),
        address: address.to_string(),
    });
}

fn unquote(text: &str) -> String {
    match text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        Some(inner) => {
            let mut result = String::with_capacity(inner.len());
            let mut escaped = false;
            for ch in inner.chars() {
                if ch == '\\' && !escaped {
                    escaped = true;
                } else {
                    result.push(ch);
                    escaped = false;
                }
            }
            result
        }
        None => text.to_string(),
    }
}
