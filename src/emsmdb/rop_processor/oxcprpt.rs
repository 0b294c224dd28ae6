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

//! Property operations on any property-bearing object.

use super::defs::*;
use crate::emsmdb::handles::RopObject;
use crate::emsmdb::message::TagAccess;
use crate::mapi::model::*;
use crate::support::error::Error;

fn check_modify(access: TagAccess) -> Result<(), Error> {
    if access.contains(TagAccess::MODIFY) {
        Ok(())
    } else {
        Err(Error::AccessDenied)
    }
}

impl RopProcessor {
    /// Fetch `tags` from the object open as `hin`, one value per tag in
    /// request order.
    pub fn rop_getpropertiesspecific(
        &mut self,
        hin: u32,
        tags: &[PropTag],
    ) -> RopResult<PropValues> {
        self.getpropertiesspecific(hin, tags)
            .map_err(map_error!(self))
    }

    fn getpropertiesspecific(
        &self,
        hin: u32,
        tags: &[PropTag],
    ) -> Result<PropValues, Error> {
        let found = match *self.handles.get(hin)? {
            RopObject::Logon => self.logon.get_properties(tags)?,
            RopObject::Folder(folder) => {
                self.logon.store().get_folder_properties(
                    self.logon.session().cpid,
                    folder.folder_id,
                    tags,
                )?
            }
            RopObject::Message(ref message) => {
                message.get_properties(&self.logon, tags)?
            }
            RopObject::Attachment(ref attachment) => {
                attachment.get_properties(tags)?
            }
            _ => return Err(Error::NotSupported),
        };

        Ok(fill_row(tags, &found))
    }

    pub fn rop_getpropertieslist(
        &mut self,
        hin: u32,
    ) -> RopResult<Vec<PropTag>> {
        self.getpropertieslist(hin).map_err(map_error!(self))
    }

    fn getpropertieslist(&self, hin: u32) -> Result<Vec<PropTag>, Error> {
        match *self.handles.get(hin)? {
            RopObject::Logon => self.logon.get_all_proptags(),
            RopObject::Folder(folder) => self
                .logon
                .store()
                .get_folder_all_proptags(folder.folder_id),
            RopObject::Message(ref message) => Ok(message.get_all_proptags()),
            RopObject::Attachment(ref attachment) => {
                Ok(attachment.get_all_proptags())
            }
            _ => Err(Error::NotSupported),
        }
    }

    /// Set `values` on the object open as `hin`, returning the values that
    /// could not be set.
    pub fn rop_setproperties(
        &mut self,
        hin: u32,
        values: &PropValues,
    ) -> RopResult<Vec<PropProblem>> {
        self.setproperties(hin, values).map_err(map_error!(self))
    }

    fn setproperties(
        &mut self,
        hin: u32,
        values: &PropValues,
    ) -> Result<Vec<PropProblem>, Error> {
        match *self.handles.get_mut(hin)? {
            RopObject::Logon => self.logon.set_properties(values),
            RopObject::Message(ref mut message) => {
                check_modify(message.tag_access())?;
                message.set_properties(values)
            }
            RopObject::Attachment(ref mut attachment) => {
                check_modify(attachment.tag_access())?;
                attachment.set_properties(values)
            }
            _ => Err(Error::NotSupported),
        }
    }

    pub fn rop_deleteproperties(
        &mut self,
        hin: u32,
        tags: &[PropTag],
    ) -> RopResult<Vec<PropProblem>> {
        self.deleteproperties(hin, tags).map_err(map_error!(self))
    }

    fn deleteproperties(
        &mut self,
        hin: u32,
        tags: &[PropTag],
    ) -> Result<Vec<PropProblem>, Error> {
        match *self.handles.get_mut(hin)? {
            RopObject::Logon => self.logon.remove_properties(tags),
            RopObject::Message(ref mut message) => {
                check_modify(message.tag_access())?;
                Ok(message.remove_properties(tags))
            }
            RopObject::Attachment(ref mut attachment) => {
                check_modify(attachment.tag_access())?;
                Ok(attachment.remove_properties(tags))
            }
            _ => Err(Error::NotSupported),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::emsmdb::handles::LOGON_HANDLE;
    use crate::emsmdb::test_prelude::*;
    use crate::mapi::tags::*;
    use crate::store::FolderRights;
    use crate::support::error::EcCode;

    #[test]
    fn logon_properties() {
        let setup = Setup::private();
        setup
            .store
            .set_store_prop(PR_DISPLAY_NAME, Value::Unicode("Box".to_owned()));
        let mut proc = setup.processor();

        let row = proc
            .rop_getpropertiesspecific(
                LOGON_HANDLE,
                &[PR_CODE_PAGE_ID, PR_DISPLAY_NAME, PR_SUBJECT],
            )
            .unwrap()
            .into_vec();
        assert_eq!(3, row.len());
        assert_eq!(PR_CODE_PAGE_ID, row[0].tag);
        assert_eq!(Value::Long(1252), row[0].value);
        assert_eq!(Value::Unicode("Box".to_owned()), row[1].value);
        assert_eq!(PR_SUBJECT.with_type(PT_ERROR), row[2].tag);
        assert_eq!(Value::Error(EcCode::NOT_FOUND), row[2].value);

        let mut values = PropValues::new();
        values.set(PR_CODE_PAGE_ID, Value::Long(65001));
        values.set(PR_DISPLAY_NAME, Value::Unicode("Mine".to_owned()));
        let problems = proc.rop_setproperties(LOGON_HANDLE, &values).unwrap();
        assert_eq!(1, problems.len());
        assert_eq!(0, problems[0].index);
        assert_eq!(
            Some(Value::Unicode("Mine".to_owned())),
            setup.store.store_prop(PR_DISPLAY_NAME)
        );

        assert!(proc
            .rop_getpropertieslist(LOGON_HANDLE)
            .unwrap()
            .contains(&PR_DISPLAY_NAME));

        proc.rop_deleteproperties(LOGON_HANDLE, &[PR_DISPLAY_NAME])
            .unwrap();
        assert_eq!(None, setup.store.store_prop(PR_DISPLAY_NAME));
    }

    #[test]
    fn message_properties_need_modify_access() {
        let setup = Setup::delegate();
        let mut props = PropValues::new();
        props.set(PR_SUBJECT, Value::Unicode("Status".to_owned()));
        let mid = setup.add_message(inbox(), props);
        setup.store.grant(inbox(), DELEGATE, FolderRights::READ_ANY);
        let mut proc = setup.processor();

        let (msg, _) = proc
            .rop_openmessage(LOGON_HANDLE, 0x0FFF, inbox(), 0, mid)
            .unwrap();
        let row = proc
            .rop_getpropertiesspecific(
                msg,
                &[PR_SUBJECT.with_type(PT_STRING8), PR_ACCESS],
            )
            .unwrap();
        assert_eq!(
            Some(&b"Status"[..]),
            row.get_bytes(PR_SUBJECT.with_type(PT_STRING8))
        );
        assert_eq!(Some(TagAccess::READ.bits()), row.get_u32(PR_ACCESS));

        let mut values = PropValues::new();
        values.set(PR_SUBJECT, Value::Unicode("Changed".to_owned()));
        assert_eq!(
            Err(EcCode::ACCESS_DENIED),
            proc.rop_setproperties(msg, &values)
        );
        assert_eq!(
            Err(EcCode::ACCESS_DENIED),
            proc.rop_deleteproperties(msg, &[PR_SUBJECT])
        );
        assert!(proc
            .rop_getpropertieslist(msg)
            .unwrap()
            .contains(&PR_SUBJECT));
    }

    #[test]
    fn message_property_problems() {
        let setup = Setup::private();
        let mut proc = setup.processor();
        let msg = proc
            .rop_createmessage(LOGON_HANDLE, 0x0FFF, inbox(), false)
            .unwrap();

        let mut values = PropValues::new();
        values.set(PR_MID, Value::I8(1));
        values.set(PR_SUBJECT, Value::Unicode("New".to_owned()));
        let problems = proc.rop_setproperties(msg, &values).unwrap();
        assert_eq!(1, problems.len());
        assert_eq!(0, problems[0].index);
        assert_eq!(EcCode::ACCESS_DENIED, problems[0].err);

        let problems = proc
            .rop_deleteproperties(msg, &[PR_SUBJECT, PR_OBJECT_TYPE])
            .unwrap();
        assert_eq!(1, problems.len());
        assert_eq!(1, problems[0].index);
        let row = proc.rop_getpropertiesspecific(msg, &[PR_SUBJECT]).unwrap();
        assert_eq!(
            Some(&Value::Error(EcCode::NOT_FOUND)),
            row.get(PR_SUBJECT.with_type(PT_ERROR))
        );
    }

    #[test]
    fn folder_properties_are_read_only() {
        let setup = Setup::private();
        let mut proc = setup.processor();
        let folder = proc.rop_openfolder(LOGON_HANDLE, inbox()).unwrap();

        let row = proc
            .rop_getpropertiesspecific(folder, &[PR_PARENT_FOLDER_ID])
            .unwrap();
        assert_eq!(Some(root_folder()), row.get_u64(PR_PARENT_FOLDER_ID));
        assert!(proc
            .rop_getpropertieslist(folder)
            .unwrap()
            .contains(&PR_FOLDER_ID));

        assert_eq!(
            Err(EcCode::NOT_SUPPORTED),
            proc.rop_setproperties(folder, &PropValues::new())
        );
        assert_eq!(
            Err(EcCode::NOT_SUPPORTED),
            proc.rop_deleteproperties(folder, &[PR_FOLDER_ID])
        );
        assert_eq!(
            Err(EcCode::NULL_OBJECT),
            proc.rop_getpropertieslist(folder + 1)
        );
    }
}
