//! Null-tolerant iteration over a folder's child lists.
//!
//! Every tree walk goes through these helpers. A missing folder, a missing
//! list and a `null` list all iterate as empty; `null` slots are skipped.
//! None of the functions here can fail.

use std::iter::Enumerate;
use std::slice;

use super::model::{Children, Doc, ElementRef, EntityKind, FileRef, Folder};

/// Live items of a child list, skipping tombstones.
pub struct Slots<'a, T> {
    inner: Indexed<'a, T>,
}

impl<'a, T> Slots<'a, T> {
    /// Pairs each live item with its raw position in the stored list.
    pub fn indexed(self) -> Indexed<'a, T> {
        self.inner
    }
}

impl<'a, T> Iterator for Slots<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, item)| item)
    }
}

/// Live items with their raw stored index. Null slots still consume an index.
pub struct Indexed<'a, T> {
    inner: Enumerate<slice::Iter<'a, Option<T>>>,
}

impl<'a, T> Iterator for Indexed<'a, T> {
    type Item = (usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .by_ref()
            .find_map(|(index, slot)| slot.as_ref().map(|item| (index, item)))
    }
}

pub fn iterable<T>(children: Option<&Children<T>>) -> Slots<'_, T> {
    let slots = children.map(Children::slots).unwrap_or(&[]);
    Slots {
        inner: Indexed {
            inner: slots.iter().enumerate(),
        },
    }
}

pub fn iterable_docs(folder: Option<&Folder>) -> Slots<'_, Doc> {
    iterable(folder.map(|f| &f.docs))
}

pub fn iterable_files(folder: Option<&Folder>) -> Slots<'_, FileRef> {
    iterable(folder.map(|f| &f.file_refs))
}

pub fn iterable_folders(folder: Option<&Folder>) -> Slots<'_, Folder> {
    iterable(folder.map(|f| &f.folders))
}

/// Live children of one kind, as [`ElementRef`]s with their stored index.
pub enum Elements<'a> {
    Docs(Indexed<'a, Doc>),
    Files(Indexed<'a, FileRef>),
    Folders(Indexed<'a, Folder>),
}

impl<'a> Iterator for Elements<'a> {
    type Item = (usize, ElementRef<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Elements::Docs(it) => it.next().map(|(i, doc)| (i, ElementRef::Doc(doc))),
            Elements::Files(it) => it.next().map(|(i, file)| (i, ElementRef::File(file))),
            Elements::Folders(it) => it.next().map(|(i, folder)| (i, ElementRef::Folder(folder))),
        }
    }
}

pub fn iterable_of_kind(folder: Option<&Folder>, kind: EntityKind) -> Elements<'_> {
    match kind {
        EntityKind::Doc => Elements::Docs(iterable_docs(folder).indexed()),
        EntityKind::File => Elements::Files(iterable_files(folder).indexed()),
        EntityKind::Folder => Elements::Folders(iterable_folders(folder).indexed()),
    }
}

/// Element stored at raw position `index` of the `kind` list, if that slot is live.
pub(crate) fn element_at(
    folder: &Folder,
    kind: EntityKind,
    index: usize,
) -> Option<ElementRef<'_>> {
    match kind {
        EntityKind::Doc => folder.docs.slots().get(index)?.as_ref().map(ElementRef::Doc),
        EntityKind::File => folder.file_refs.slots().get(index)?.as_ref().map(ElementRef::File),
        EntityKind::Folder => folder.folders.slots().get(index)?.as_ref().map(ElementRef::Folder),
    }
}
