use crossbeam::atomic::AtomicCell;
use paste::paste;

/// Used to generate a getter and an adder for AtomicCell<T> counters
/// Eg.
/// If there is field like
/// xyz : AtomicCell<u64>
///
/// Then we can simply use following code in the impl block
/// cell_get_add!(xyz: u64);
///
/// pub fn xyz(&self) -> u64 {/*...*/}
/// pub fn add_xyz(&self, value: u64) {/*...*/}
macro_rules! cell_get_add {
    ($field:ident: $ty:ty) => {
        pub fn $field(&self) -> $ty {
            self.$field.load()
        }

        // paste! macro is used to concatenate identifiers
        // See : https://docs.rs/paste/latest/paste
        paste! {
            pub fn [<add_ $field>](&self, val: $ty) {
                self.$field.fetch_add(val);
            }
        }
    };
}

/// Progress of a check, shared between the tasks hashing the pieces and whoever displays it
#[derive(Debug, Default)]
pub struct Progress {
    /// Total pieces checked, whether they could be read or not
    pieces_checked: AtomicCell<usize>,

    /// Total bytes read from the disk
    bytes_read: AtomicCell<u64>,
}

impl Progress {
    cell_get_add!(pieces_checked: usize);

    cell_get_add!(bytes_read: u64);
}
