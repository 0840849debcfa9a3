use std::sync::Arc;
use std::thread;

use vc_serial::codegen::Generator;
use vc_serial::reach::{Field, ReachTable, Target, TypeKind, Width};
use vc_serial::runtime::{Process, Runtime};

#[test]
fn runtimes_share_one_process() {
    let mut table = ReachTable::new();
    let u64_ty = table.declare("U64", TypeKind::Primitive);
    table.get_mut(u64_ty).set_word(Width::W8);
    let node = table.declare("Node", TypeKind::Class);
    table
        .get_mut(node)
        .push_field(Field::new(node))
        .push_field(Field::new(u64_ty));

    let program = Arc::new(Generator::new(table, Target::default()).generate_all());
    let process = Arc::new(Process::new(program));

    let lengths = thread::scope(|s| {
        let handles = (0..4u64)
            .map(|worker| {
                let process = process.clone();
                s.spawn(move || {
                    let mut rt = Runtime::new(process);

                    // A chain of `worker + 1` nodes closed into a ring.
                    let head = rt.alloc_object(node).unwrap();
                    let mut tail = head;
                    for step in 0..worker {
                        let next = rt.alloc_object(node).unwrap();
                        rt.write_field(next, 1, worker * 100 + step).unwrap();
                        rt.write_field(tail, 0, next).unwrap();
                        tail = next;
                    }
                    rt.write_field(tail, 0, head).unwrap();

                    let bytes = rt.serialise(head).unwrap();
                    let copy = rt.deserialise(&bytes).unwrap();

                    let mut cursor = rt.read_field(copy, 0).unwrap();
                    for step in 0..worker {
                        assert_eq!(rt.read_field(cursor, 1).unwrap(), worker * 100 + step);
                        cursor = rt.read_field(cursor, 0).unwrap();
                    }
                    assert_eq!(cursor, copy);
                    bytes.len()
                })
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>()
    });

    assert_eq!(lengths, [24, 48, 72, 96]);
}
