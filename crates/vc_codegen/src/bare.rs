//! Bare interface fields.
//!
//! A bare interface value is a plain function value of one of a closed set
//! of implementers. On the wire it is the implementer's identity.

use vc_reach::{ReachableType, Width};

use crate::builder::FunctionBuilder;
use crate::ir::{Symbol, Value};

/// Writes the identity of the implementer stored at `ptr` to `dest`.
///
/// Each implementer but the last is tested against its instance in
/// enumeration order. The last one is taken without a test, as the subtype
/// set is exhaustive. An interface without implementers writes nothing.
pub(crate) fn serialise_interface(
    b: &mut FunctionBuilder,
    ty: &ReachableType,
    ptr: Value,
    dest: Value,
    word: Width,
) {
    let Some((&last, rest)) = ty.subtypes().split_last() else {
        return;
    };

    let mut current = b.current_block();
    let object = b.load(ptr, word);

    let post = b.append_block("bare_post");
    b.position_at_end(post);
    let phi = b.phi();
    b.position_at_end(current);

    for &sub in rest {
        let next = b.append_block("bare_subtype");
        let instance = b.symbol(Symbol::Instance(sub));
        let test = b.icmp_eq(object, instance);
        let id = b.const_int(sub.get() as u64);
        b.branch(test, post, next);
        b.add_incoming(phi, current, id);

        b.position_at_end(next);
        current = next;
    }

    let id = b.const_int(last.get() as u64);
    b.jump(post);
    b.add_incoming(phi, current, id);

    b.move_block_after(post, current);
    b.position_at_end(post);
    b.store(dest, phi, word);
}

/// Replaces the identity stored at `ptr` with that type's instance.
pub(crate) fn deserialise_interface(
    b: &mut FunctionBuilder,
    ty: &ReachableType,
    ptr: Value,
    word: Width,
) {
    if ty.subtypes().is_empty() {
        return;
    }
    let id = b.load(ptr, word);
    let instance = b.desc_instance(id);
    b.store(ptr, instance, word);
}
