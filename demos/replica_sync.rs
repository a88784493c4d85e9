extern crate lwwset;

use lwwset::{LWWSet, Op};

fn ops_of(set: &LWWSet<String>) -> Vec<Op<String>> {
    set.add_entries()
        .into_iter()
        .map(|(member, stamp)| Op::Add { member, stamp })
        .chain(
            set.remove_entries()
                .into_iter()
                .map(|(member, stamp)| Op::Remove { member, stamp }),
        )
        .collect()
}

fn main() {
    let phone = LWWSet::new();
    let laptop = LWWSet::new();

    // the phone builds a packing list
    phone.add("tent".to_string(), 1).unwrap();
    phone.add("stove".to_string(), 2).unwrap();

    // the laptop, offline, has its own opinion: the stove is broken,
    // take the grill instead
    laptop.remove("stove".to_string(), 3).unwrap();
    laptop.add("grill".to_string(), 4).unwrap();

    // meanwhile the phone drops the tent...
    phone.remove("tent".to_string(), 5).unwrap();
    // ...and the laptop re-adds it once the forecast turns
    laptop.add("tent".to_string(), 6).unwrap();

    // once the two devices synchronize, in either direction...
    let phone_ops = ops_of(&phone);
    let laptop_ops = ops_of(&laptop);
    phone.apply_all(laptop_ops).unwrap();
    laptop.apply_all(phone_ops).unwrap();

    // ...they agree on the list: the tent survived (its re-add at 6
    // outranks the remove at 5) and the stove did not.
    assert_eq!(phone, laptop);

    let mut list = phone.values();
    list.sort();
    assert_eq!(list, vec!["grill".to_string(), "tent".to_string()]);

    println!("packing list: {:?}", list);
}
